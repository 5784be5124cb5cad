use std::collections::HashMap;

use serde_json::Map;
use serde_json::Value;

use crate::element::Element;

use super::context::TranslationContext;
use super::context::TranslationOptions;
use super::context::basic_language_resolver;
use super::sanitizer;
use super::translator::DefinitionUpdate;
use super::translator::FieldDefinition;
use super::translator::Translator;
use super::translator::TranslatorId;
use super::translator::XName;
use super::translator::ChildLink;
use super::translator::XmlExporter;
use super::translator::XmlImporter;
use super::types::create_element;

const ROOT: TranslatorId = TranslatorId(0);

/// A tree rewriter applied to the JSON form of a raw subtree before it
/// enters or leaves a record.
pub type Sanitizer = fn(&Value) -> Option<Value>;

pub type LanguageResolver = Box<dyn Fn(&[String], &[String], &str) -> String>;

/// Where a definition is linked into the record tree, and how records
/// found there behave.
#[derive(Debug, Clone, Default)]
pub struct LinkPath {
    pub path: String,
    pub multiple: bool,
    pub selector: Option<String>,
    pub context_field: Option<String>,
    pub implied_type: bool,
}

impl LinkPath {
    pub fn new(path: &str) -> LinkPath {
        LinkPath {
            path: path.to_string(),
            ..LinkPath::default()
        }
    }

    pub fn multiple(path: &str) -> LinkPath {
        LinkPath {
            path: path.to_string(),
            multiple: true,
            ..LinkPath::default()
        }
    }
}

/// A declarative schema entry: which element it matches, where it
/// lives in the record tree, and the fields it carries.
#[derive(Default)]
pub struct Definition {
    pub namespace: String,
    pub element: String,
    pub path: String,
    pub aliases: Vec<LinkPath>,
    pub type_field: String,
    pub default_type: String,
    pub language_field: String,
    pub type_value: String,
    pub type_order: Option<i32>,
    pub fields: Vec<(String, FieldDefinition)>,
    pub children_export_order: Vec<(String, i32)>,
    pub optional_namespaces: Vec<(String, String)>,
}

/// Holds every known translator and the (namespace, element) index
/// used to find an importer for incoming XML.
pub struct Registry {
    translators: Vec<Translator>,
    index: HashMap<XName, TranslatorId>,
    language_resolver: LanguageResolver,
    sanitizers: HashMap<String, Sanitizer>,
}

impl Registry {
    pub fn new() -> Registry {
        let mut sanitizers: HashMap<String, Sanitizer> = HashMap::new();
        sanitizers.insert("xhtmlim".to_string(), sanitizer::xhtml_im);
        Registry {
            translators: vec![Translator::new()],
            index: HashMap::new(),
            language_resolver: Box::new(basic_language_resolver),
            sanitizers,
        }
    }

    pub fn set_language_resolver(
        &mut self,
        resolver: impl Fn(&[String], &[String], &str) -> String + 'static,
    ) {
        self.language_resolver = Box::new(resolver);
    }

    pub fn add_sanitizer(&mut self, name: &str, sanitizer: Sanitizer) {
        self.sanitizers.insert(name.to_string(), sanitizer);
    }

    pub(crate) fn sanitizer(&self, name: &str) -> Option<Sanitizer> {
        self.sanitizers.get(name).copied()
    }

    pub(crate) fn resolve_language(
        &self,
        available: &[String],
        accept_languages: &[String],
        current: &str,
    ) -> String {
        (self.language_resolver)(available, accept_languages, current)
    }

    //
    // Definition loading
    //

    pub fn define_all(&mut self, definitions: Vec<Definition>) {
        for definition in definitions {
            self.define(definition);
        }
    }

    pub fn define(&mut self, definition: Definition) {
        let mut aliases = definition.aliases.clone();
        if !definition.path.is_empty() && !aliases.iter().any(|a| a.path == definition.path) {
            aliases.push(LinkPath::new(&definition.path));
        }
        // Deepest paths first, so replacement targets resolve from the
        // most specific alias.
        aliases.sort_by(|a, b| {
            let a_len = a.path.split('.').count();
            let b_len = b.path.split('.').count();
            b_len.cmp(&a_len)
        });

        let xid = XName::new(&definition.namespace, &definition.element);
        let mut translator = self.index.get(&xid).copied();
        if translator.is_none() {
            let mut placeholder = None;
            for alias in &aliases {
                if let Some(found) = self.walk_to_translator(&split_path(&alias.path)) {
                    if !self.translators[found.0].placeholder {
                        translator = Some(found);
                        break;
                    }
                    placeholder = Some(found);
                }
            }
            if translator.is_none() {
                if let Some(found) = placeholder {
                    self.translators[found.0].placeholder = false;
                    translator = Some(found);
                }
            }
        }
        let translator =
            translator.unwrap_or_else(|| self.get_or_create_translator(&xid));
        self.index.insert(xid, translator);

        {
            let target = &mut self.translators[translator.0];
            if !definition.type_field.is_empty() {
                target.type_field = definition.type_field.clone();
            }
            if !definition.default_type.is_empty() {
                target.default_type = definition.default_type.clone();
            }
            if !definition.language_field.is_empty() {
                target.language_field = definition.language_field.clone();
            }
        }

        let mut update = DefinitionUpdate::new(&definition.namespace, &definition.element);
        for (name, field) in &definition.fields {
            update.importers.insert(name.clone(), field.importer.clone());
            update
                .importer_ordering
                .insert(name.clone(), field.import_order);
            update.exporters.insert(name.clone(), field.exporter.clone());
            update
                .exporter_ordering
                .insert(name.clone(), field.export_order);
        }
        for (name, order) in &definition.children_export_order {
            update.exporter_ordering.insert(name.clone(), *order);
        }
        for (prefix, namespace) in &definition.optional_namespaces {
            update
                .optional_namespaces
                .insert(prefix.clone(), namespace.clone());
        }
        if !definition.type_value.is_empty() {
            update.type_value = Some(definition.type_value.clone());
        }
        update.type_order = definition.type_order;
        self.translators[translator.0].update_definition(update);

        for alias in &aliases {
            self.link_alias(
                &definition.namespace,
                &definition.element,
                alias,
                &definition.type_value,
            );
        }
        // Any placeholder still occupying an alias path is folded into
        // the defined translator.
        for alias in &aliases {
            if let Some(existing) = self.walk_to_translator(&split_path(&alias.path)) {
                if existing != translator {
                    self.replace_with(existing, translator);
                }
            }
        }
    }

    /// Links an already-defined element at an additional record path.
    pub fn alias(&mut self, namespace: &str, element: &str, path: &str) {
        self.link_alias(namespace, element, &LinkPath::new(path), "");
    }

    fn link_alias(&mut self, namespace: &str, element: &str, link: &LinkPath, context_type: &str) {
        let xid = XName::new(namespace, element);
        let linked = self.get_or_create_translator(&xid);
        self.translators[linked.0].placeholder = false;
        let keys = split_path(&link.path);
        let Some((final_key, parent_keys)) = keys.split_last() else {
            return;
        };
        let parent = self.walk_or_vivify(parent_keys);
        if !context_type.is_empty() && (link.context_field.is_some() || link.implied_type) {
            self.translators[linked.0].add_context(
                &link.path,
                link.selector.as_deref(),
                link.context_field.as_deref(),
                xid.clone(),
                context_type,
                link.implied_type,
            );
        }
        self.add_child(
            parent,
            final_key,
            linked,
            link.multiple,
            link.selector.as_deref(),
            Some(xid),
        );
    }

    fn add_child(
        &mut self,
        parent_id: TranslatorId,
        name: &str,
        child_id: TranslatorId,
        multiple: bool,
        selector: Option<&str>,
        implicit: Option<XName>,
    ) {
        let existing = self.translators[parent_id.0]
            .children
            .get(name)
            .map(|link| link.translator);
        let Some(existing_id) = existing else {
            self.translators[child_id.0].parents.insert(parent_id);
            let xids: Vec<XName> = self.translators[child_id.0].importers.keys().cloned().collect();
            let parent = &mut self.translators[parent_id.0];
            parent.children.insert(
                name.to_string(),
                ChildLink {
                    translator: child_id,
                    multiple,
                    selector: selector.map(String::from),
                },
            );
            for xid in xids {
                if !parent.implicit_children.contains(&xid) {
                    parent.children_index.insert(xid, name.to_string());
                }
            }
            if let Some(implicit) = implicit {
                parent.implicit_children.insert(implicit);
            }
            return;
        };
        // The path is already occupied: merge the new definition data
        // into the resident translator instead of displacing it.
        if let Some(link) = self.translators[parent_id.0].children.get_mut(name) {
            link.multiple = multiple;
            if selector.is_some() && link.selector.is_some() && selector != link.selector.as_deref()
            {
                link.selector = None;
            }
        }
        let contexts = self.translators[child_id.0].contexts.clone();
        let importers: Vec<(XName, XmlImporter)> = self.translators[child_id.0]
            .importers
            .iter()
            .map(|(xid, importer)| (xid.clone(), importer.clone()))
            .collect();
        let exporters: Vec<(String, XmlExporter)> = self.translators[child_id.0]
            .exporters
            .iter()
            .map(|(type_value, exporter)| (type_value.clone(), exporter.clone()))
            .collect();
        for (xid, importer) in importers {
            let type_value = self.translators[existing_id.0].type_values.get(&xid).cloned();
            let mut update = DefinitionUpdate::new(&importer.namespace, &importer.element);
            update.contexts = contexts.clone();
            update.importers = importer.fields;
            update.importer_ordering = importer.field_orders;
            update.type_value = type_value;
            self.translators[existing_id.0].update_definition(update);
            let parent = &mut self.translators[parent_id.0];
            if !parent.implicit_children.contains(&xid) {
                parent.children_index.insert(xid, name.to_string());
            }
        }
        for (type_value, exporter) in exporters {
            let mut update = DefinitionUpdate::new(&exporter.namespace, &exporter.element);
            update.contexts = contexts.clone();
            update.exporters = exporter.fields;
            update.exporter_ordering = exporter.field_orders;
            update.optional_namespaces = exporter.optional_namespaces;
            update.type_value = Some(type_value).filter(|t| !t.is_empty());
            self.translators[existing_id.0].update_definition(update);
        }
    }

    /// Points every link at `old` to `new` and folds the accumulated
    /// child tables of `old` into `new`.
    fn replace_with(&mut self, old: TranslatorId, new: TranslatorId) {
        if old == new {
            return;
        }
        let (children, children_index, contexts, implicit, parents) = {
            let source = &self.translators[old.0];
            (
                source.children.clone(),
                source.children_index.clone(),
                source.contexts.clone(),
                source.implicit_children.clone(),
                source.parents.clone(),
            )
        };
        {
            let target = &mut self.translators[new.0];
            target.children.extend(children);
            target.children_index.extend(children_index);
            target.contexts.extend(contexts);
            target.implicit_children.extend(implicit);
        }
        for parent in parents {
            for link in self.translators[parent.0].children.values_mut() {
                if link.translator == old {
                    link.translator = new;
                }
            }
            self.translators[new.0].parents.insert(parent);
        }
        self.translators[old.0].parents.clear();
    }

    fn walk_to_translator(&self, path: &[&str]) -> Option<TranslatorId> {
        let mut current = ROOT;
        for key in path {
            current = self.translators[current.0].children.get(*key)?.translator;
        }
        Some(current)
    }

    fn walk_or_vivify(&mut self, path: &[&str]) -> TranslatorId {
        let mut current = ROOT;
        for key in path {
            let next = self.translators[current.0]
                .children
                .get(*key)
                .map(|link| link.translator);
            current = match next {
                Some(id) => id,
                None => {
                    let id = self.new_translator();
                    self.translators[id.0].placeholder = true;
                    self.add_child(current, key, id, false, None, None);
                    id
                }
            };
        }
        current
    }

    fn new_translator(&mut self) -> TranslatorId {
        let id = TranslatorId(self.translators.len());
        self.translators.push(Translator::new());
        id
    }

    fn get_or_create_translator(&mut self, xid: &XName) -> TranslatorId {
        match self.index.get(xid) {
            Some(id) => *id,
            None => {
                let id = self.new_translator();
                self.index.insert(xid.clone(), id);
                id
            }
        }
    }

    //
    // Import
    //

    /// The record-tree key an element would import under, if any.
    pub fn get_import_key(&self, xml: &Element) -> Option<String> {
        self.translators[ROOT.0]
            .children_index
            .get(&XName::of(xml))
            .cloned()
    }

    pub fn import(&self, xml: &Element) -> Option<Value> {
        self.import_with(xml, &TranslationOptions::default())
    }

    pub fn import_with(&self, xml: &Element, options: &TranslationOptions) -> Option<Value> {
        let id = *self.index.get(&XName::of(xml))?;
        let mut context = TranslationContext::new(self, options);
        context.path = self.get_import_key(xml).unwrap_or_default();
        self.translator_import(id, xml, &context)
    }

    fn translator_import(
        &self,
        id: TranslatorId,
        xml: &Element,
        context: &TranslationContext<'_>,
    ) -> Option<Value> {
        let translator = &self.translators[id.0];
        let xid = XName::of(xml);
        let importer = translator.importers.get(&xid)?;
        let type_value = translator.type_values.get(&xid).cloned();
        let mut output = Map::new();

        let implied = context
            .path_selector
            .as_ref()
            .and_then(|selector| {
                translator
                    .contexts
                    .get(&format!("{}[{selector}]", context.path))
            })
            .or_else(|| translator.contexts.get(&context.path));
        if let Some(implied) = implied {
            if implied.implied_type.is_none() {
                if let Some(implied_value) = implied.type_values.get(&xid) {
                    output.insert(
                        implied.type_field.clone(),
                        Value::String(implied_value.clone()),
                    );
                }
            }
        } else if !translator.type_field.is_empty() {
            if let Some(type_value) = &type_value {
                if *type_value != translator.default_type {
                    output.insert(
                        translator.type_field.clone(),
                        Value::String(type_value.clone()),
                    );
                }
            }
        }

        let lang = xml
            .attribute("xml:lang")
            .filter(|lang| !lang.is_empty())
            .map(|lang| lang.to_lowercase())
            .unwrap_or_else(|| context.lang.clone());
        let mut child_context = TranslationContext {
            registry: self,
            lang,
            accept_languages: context.accept_languages.clone(),
            path: String::new(),
            path_selector: type_value.clone(),
            namespace: context.namespace.clone(),
            element: context.element.clone(),
        };

        let mut field_order: Vec<(&String, i32)> = importer
            .field_orders
            .iter()
            .map(|(name, order)| (name, *order))
            .collect();
        field_order.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        for (name, _) in field_order.iter().filter(|(_, order)| *order >= 0) {
            let Some(field) = importer.fields.get(*name) else {
                continue;
            };
            child_context.path = join_path(&context.path, name);
            if let Some(value) = field(xml, &child_context) {
                output.insert((*name).clone(), value);
            }
        }

        for child in xml.child_elements() {
            let child_xid = XName::of(&child);
            let Some(field_name) = translator.children_index.get(&child_xid) else {
                continue;
            };
            let Some(link) = translator.children.get(field_name) else {
                continue;
            };
            if link.selector.is_some() && link.selector != type_value {
                continue;
            }
            child_context.path = join_path(&context.path, field_name);
            let Some(child_output) = self.translator_import(link.translator, &child, &child_context)
            else {
                continue;
            };
            if link.multiple {
                match output.get_mut(field_name) {
                    Some(Value::Array(items)) => items.push(child_output),
                    _ => {
                        output.insert(field_name.clone(), Value::Array(vec![child_output]));
                    }
                }
            } else if let Some(existing) = output.remove(field_name) {
                let resolved = self.translators[link.translator.0]
                    .resolve_collision(existing, child_output);
                output.insert(field_name.clone(), resolved);
            } else {
                output.insert(field_name.clone(), child_output);
            }
        }

        for (name, _) in field_order.iter().filter(|(_, order)| *order < 0) {
            let Some(field) = importer.fields.get(*name) else {
                continue;
            };
            child_context.path = join_path(&context.path, name);
            if let Some(value) = field(xml, &child_context) {
                output.insert((*name).clone(), value);
            }
        }

        Some(Value::Object(output))
    }

    //
    // Export
    //

    pub fn export(&self, path: &str, data: &Value) -> Option<Element> {
        self.export_with(path, data, &TranslationOptions::default())
    }

    pub fn export_with(
        &self,
        path: &str,
        data: &Value,
        options: &TranslationOptions,
    ) -> Option<Element> {
        let id = self.walk_to_translator(&split_path(path))?;
        let mut context = TranslationContext::new(self, options);
        context.path = path.to_string();
        self.translator_export(id, data, &context)
    }

    pub(crate) fn export_in_context(
        &self,
        path: &str,
        data: &Value,
        context: &TranslationContext<'_>,
    ) -> Option<Element> {
        let id = self.walk_to_translator(&split_path(path))?;
        self.translator_export(id, data, context)
    }

    fn translator_export(
        &self,
        id: TranslatorId,
        data: &Value,
        context: &TranslationContext<'_>,
    ) -> Option<Element> {
        let translator = &self.translators[id.0];
        let record = data.as_object()?;

        let implied = context
            .path_selector
            .as_ref()
            .and_then(|selector| {
                translator
                    .contexts
                    .get(&format!("{}[{selector}]", context.path))
            })
            .or_else(|| translator.contexts.get(&context.path));
        let export_type = if let Some(implied) = implied {
            implied
                .implied_type
                .clone()
                .or_else(|| {
                    record
                        .get(&implied.type_field)
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or_else(|| translator.default_type.clone())
        } else if !translator.type_field.is_empty() {
            record
                .get(&translator.type_field)
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| translator.default_type.clone())
        } else {
            translator.default_type.clone()
        };

        let exporter = translator.exporters.get(&export_type)?;
        let output = create_element(
            &exporter.namespace,
            &exporter.element,
            context.namespace.as_deref(),
            context.element.as_ref(),
        );
        if let Some(parent) = &context.element {
            output.set_parent(parent);
        }
        for (prefix, namespace) in &exporter.optional_namespaces {
            output.add_optional_namespace(prefix, namespace);
        }

        let lang = record
            .get(&translator.language_field)
            .and_then(Value::as_str)
            .filter(|lang| !lang.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| context.lang.clone());
        let mut child_context = TranslationContext {
            registry: self,
            lang,
            accept_languages: context.accept_languages.clone(),
            path: String::new(),
            path_selector: Some(export_type.clone()),
            namespace: Some(output.default_namespace()),
            element: Some(output.clone()),
        };

        // The language attribute is written first so children see the
        // element's own language while exporting.
        if let Some(lang_exporter) = exporter.fields.get(&translator.language_field) {
            let lang_value = record
                .get(&translator.language_field)
                .cloned()
                .unwrap_or(Value::Null);
            lang_exporter(&output, &lang_value, context);
        }

        let mut keys: Vec<&String> = record.keys().collect();
        keys.sort_by_key(|key| {
            exporter
                .field_orders
                .get(*key)
                .copied()
                .unwrap_or(100_000)
        });
        for key in keys {
            if *key == translator.language_field {
                continue;
            }
            let value = &record[key];
            if let Some(field) = exporter.fields.get(key) {
                field(&output, value, &child_context);
                continue;
            }
            let Some(link) = translator.children.get(key) else {
                continue;
            };
            if link.selector.is_some() && link.selector.as_deref() != Some(&export_type) {
                continue;
            }
            child_context.path = join_path(&context.path, key);
            let items: Vec<&Value> = if link.multiple {
                value.as_array().map(|a| a.iter().collect()).unwrap_or_default()
            } else {
                vec![value]
            };
            for item in items {
                if let Some(child) = self.translator_export(link.translator, item, &child_context) {
                    output.append_child(child);
                }
            }
        }

        Some(output)
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|key| !key.is_empty()).collect()
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
