use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::element::Element;

use super::context::TranslationContext;

/// Identity of an element on the wire: namespace plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XName {
    pub namespace: String,
    pub local: String,
}

impl XName {
    pub fn new(namespace: &str, local: &str) -> XName {
        XName {
            namespace: namespace.to_string(),
            local: local.to_string(),
        }
    }

    pub fn of(xml: &Element) -> XName {
        XName {
            namespace: xml.namespace(),
            local: xml.local_name(),
        }
    }
}

/// Stable handle into the registry's translator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranslatorId(pub(crate) usize);

pub type Importer = Rc<dyn Fn(&Element, &TranslationContext) -> Option<Value>>;
pub type Exporter = Rc<dyn Fn(&Element, &Value, &TranslationContext)>;

/// An importer/exporter pair for one record field, plus its position in
/// the processing order. Negative import orders run after child
/// elements have been imported.
#[derive(Clone)]
pub struct FieldDefinition {
    pub importer: Importer,
    pub exporter: Exporter,
    pub import_order: i32,
    pub export_order: i32,
}

impl FieldDefinition {
    pub fn new(importer: Importer, exporter: Exporter) -> FieldDefinition {
        FieldDefinition {
            importer,
            exporter,
            import_order: 0,
            export_order: 0,
        }
    }

    pub fn with_order(mut self, order: i32) -> FieldDefinition {
        self.import_order = order;
        self.export_order = order;
        self
    }

    pub fn with_import_order(mut self, order: i32) -> FieldDefinition {
        self.import_order = order;
        self
    }

    pub fn with_export_order(mut self, order: i32) -> FieldDefinition {
        self.export_order = order;
        self
    }
}

// Field tables for importing one element shape.
#[derive(Clone)]
pub(crate) struct XmlImporter {
    pub namespace: String,
    pub element: String,
    pub fields: HashMap<String, Importer>,
    pub field_orders: HashMap<String, i32>,
}

// Field tables for exporting one type variation.
#[derive(Clone)]
pub(crate) struct XmlExporter {
    pub namespace: String,
    pub element: String,
    pub fields: HashMap<String, Exporter>,
    pub field_orders: HashMap<String, i32>,
    pub optional_namespaces: HashMap<String, String>,
}

#[derive(Clone)]
pub(crate) struct ChildLink {
    pub translator: TranslatorId,
    pub multiple: bool,
    pub selector: Option<String>,
}

// Type information implied by reaching a translator through a given
// record path.
#[derive(Clone)]
pub(crate) struct TypeContext {
    pub type_field: String,
    pub implied_type: Option<String>,
    pub type_values: HashMap<XName, String>,
}

// One batch of definition data merged into a translator.
pub(crate) struct DefinitionUpdate {
    pub namespace: String,
    pub element: String,
    pub contexts: HashMap<String, TypeContext>,
    pub importers: HashMap<String, Importer>,
    pub importer_ordering: HashMap<String, i32>,
    pub exporters: HashMap<String, Exporter>,
    pub exporter_ordering: HashMap<String, i32>,
    pub optional_namespaces: HashMap<String, String>,
    pub type_value: Option<String>,
    pub type_order: Option<i32>,
}

impl DefinitionUpdate {
    pub fn new(namespace: &str, element: &str) -> DefinitionUpdate {
        DefinitionUpdate {
            namespace: namespace.to_string(),
            element: element.to_string(),
            contexts: HashMap::new(),
            importers: HashMap::new(),
            importer_ordering: HashMap::new(),
            exporters: HashMap::new(),
            exporter_ordering: HashMap::new(),
            optional_namespaces: HashMap::new(),
            type_value: None,
            type_order: None,
        }
    }
}

/// One schema node. Translators are owned by the registry's arena and
/// referenced by [TranslatorId]; `parents` is the reverse adjacency
/// needed to retarget links when a placeholder is replaced.
pub(crate) struct Translator {
    pub placeholder: bool,
    pub type_field: String,
    pub default_type: String,
    pub language_field: String,
    pub type_values: HashMap<XName, String>,
    pub type_orders: HashMap<String, i32>,
    pub importers: HashMap<XName, XmlImporter>,
    pub exporters: HashMap<String, XmlExporter>,
    pub children: HashMap<String, ChildLink>,
    pub children_index: HashMap<XName, String>,
    pub implicit_children: HashSet<XName>,
    pub contexts: HashMap<String, TypeContext>,
    pub parents: HashSet<TranslatorId>,
}

impl Translator {
    pub fn new() -> Translator {
        Translator {
            placeholder: false,
            type_field: String::new(),
            default_type: String::new(),
            language_field: "lang".to_string(),
            type_values: HashMap::new(),
            type_orders: HashMap::new(),
            importers: HashMap::new(),
            exporters: HashMap::new(),
            children: HashMap::new(),
            children_index: HashMap::new(),
            implicit_children: HashSet::new(),
            contexts: HashMap::new(),
            parents: HashSet::new(),
        }
    }

    pub fn add_context(
        &mut self,
        path: &str,
        selector: Option<&str>,
        field: Option<&str>,
        xid: XName,
        value: &str,
        implied: bool,
    ) {
        let key = match selector {
            Some(selector) => format!("{path}[{selector}]"),
            None => path.to_string(),
        };
        let context = self.contexts.entry(key).or_insert_with(|| TypeContext {
            type_field: String::new(),
            implied_type: None,
            type_values: HashMap::new(),
        });
        if implied {
            context.implied_type = Some(value.to_string());
        }
        context.type_field = field.unwrap_or("").to_string();
        context.type_values.insert(xid, value.to_string());
    }

    /// Merges new field tables into this translator. Typed updates
    /// extend one export variation; an untyped update on a typed
    /// translator extends every known variation.
    pub fn update_definition(&mut self, update: DefinitionUpdate) {
        let xid = XName::new(&update.namespace, &update.element);
        {
            let importer = self
                .importers
                .entry(xid.clone())
                .or_insert_with(|| XmlImporter {
                    namespace: update.namespace.clone(),
                    element: update.element.clone(),
                    fields: HashMap::new(),
                    field_orders: HashMap::new(),
                });
            for (name, field) in &update.importers {
                importer.fields.insert(name.clone(), field.clone());
            }
            for (name, order) in &update.importer_ordering {
                importer.field_orders.insert(name.clone(), *order);
            }
        }
        {
            let export_key = update
                .type_value
                .clone()
                .unwrap_or_else(|| self.default_type.clone());
            let exporter = self.exporters.entry(export_key).or_insert_with(|| XmlExporter {
                namespace: update.namespace.clone(),
                element: update.element.clone(),
                fields: HashMap::new(),
                field_orders: HashMap::new(),
                optional_namespaces: HashMap::new(),
            });
            for (name, field) in &update.exporters {
                exporter.fields.insert(name.clone(), field.clone());
            }
            for (name, order) in &update.exporter_ordering {
                exporter.field_orders.insert(name.clone(), *order);
            }
            for (prefix, namespace) in &update.optional_namespaces {
                exporter
                    .optional_namespaces
                    .insert(prefix.clone(), namespace.clone());
            }
        }
        for (path, new_context) in &update.contexts {
            let context = self
                .contexts
                .entry(path.clone())
                .or_insert_with(|| TypeContext {
                    type_field: new_context.type_field.clone(),
                    implied_type: None,
                    type_values: HashMap::new(),
                });
            if context.type_field.is_empty() {
                context.type_field = new_context.type_field.clone();
            }
            if context.implied_type.is_none() {
                context.implied_type = new_context.implied_type.clone();
            }
            for (xid, type_value) in &new_context.type_values {
                context.type_values.insert(xid.clone(), type_value.clone());
            }
        }
        if let Some(type_value) = &update.type_value {
            self.type_values.insert(xid, type_value.clone());
            if let Some(order) = update.type_order {
                self.type_orders.insert(type_value.clone(), order);
            }
        } else if !self.type_field.is_empty() {
            for importer in self.importers.values_mut() {
                for (name, field) in &update.importers {
                    importer.fields.insert(name.clone(), field.clone());
                }
                for (name, order) in &update.importer_ordering {
                    importer.field_orders.insert(name.clone(), *order);
                }
            }
            for exporter in self.exporters.values_mut() {
                for (name, field) in &update.exporters {
                    exporter.fields.insert(name.clone(), field.clone());
                }
                for (name, order) in &update.exporter_ordering {
                    exporter.field_orders.insert(name.clone(), *order);
                }
            }
        }
    }

    /// When two siblings map to the same non-multiple field, the record
    /// whose type has the lower declared priority wins ties in favor of
    /// the value seen first.
    pub fn resolve_collision(&self, existing: Value, new: Value) -> Value {
        let existing_order = self.type_priority(&existing);
        let new_order = self.type_priority(&new);
        if existing_order <= new_order { existing } else { new }
    }

    fn type_priority(&self, data: &Value) -> i32 {
        let type_value = data
            .get(&self.type_field)
            .and_then(Value::as_str)
            .unwrap_or(&self.default_type);
        self.type_orders.get(type_value).copied().unwrap_or(0)
    }
}
