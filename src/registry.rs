//! Typed registry of widgets, fields and templates.
//!
//! Built-in components are closed enums. A host registers its own
//! components by name through [`RegistryOverrides`]; an override whose name
//! matches a built-in replaces it. The merge happens once per form instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::schema_type;

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name() == name)
            }
        }
    };
}

named_enum!(
    /// Widgets every registry starts with.
    BuiltinWidget {
        AltDateTimeWidget,
        AltDateWidget,
        CheckboxesWidget,
        CheckboxWidget,
        ColorWidget,
        DateTimeWidget,
        DateWidget,
        EmailWidget,
        FileWidget,
        HiddenWidget,
        PasswordWidget,
        RadioWidget,
        RangeWidget,
        SelectWidget,
        TextareaWidget,
        TextWidget,
        TimeWidget,
        UpDownWidget,
        URLWidget,
    }
);

named_enum!(
    /// Fields every registry starts with.
    BuiltinField {
        AnyOfField,
        ArrayField,
        BooleanField,
        NullField,
        NumberField,
        ObjectField,
        OneOfField,
        SchemaField,
        StringField,
        UnsupportedField,
    }
);

named_enum!(
    /// Templates every registry starts with.
    TemplateKind {
        ArrayFieldDescriptionTemplate,
        ArrayFieldItemTemplate,
        ArrayFieldTemplate,
        ArrayFieldTitleTemplate,
        BaseInputTemplate,
        DescriptionFieldTemplate,
        ErrorListTemplate,
        FieldErrorTemplate,
        FieldHelpTemplate,
        FieldTemplate,
        ObjectFieldTemplate,
        TitleFieldTemplate,
        UnsupportedFieldTemplate,
        WrapIfAdditionalTemplate,
    }
);

/// A registry entry: a built-in or a host-provided component name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum Component<B> {
    Builtin(B),
    Custom(String),
}

impl<B: Copy> Component<B> {
    pub fn builtin(&self) -> Option<B> {
        match self {
            Component::Builtin(b) => Some(*b),
            Component::Custom(_) => None,
        }
    }
}

pub type WidgetRef = Component<BuiltinWidget>;
pub type FieldRef = Component<BuiltinField>;
pub type TemplateRef = Component<TemplateKind>;

/// Host-supplied registrations, keyed by the name used in uiSchema.
/// Values are the host's component identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOverrides {
    pub widgets: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
    pub templates: BTreeMap<String, String>,
}

/// Widget aliases usable in `ui:widget`, per schema type.
fn widget_alias(schema_type: &str, alias: &str) -> Option<BuiltinWidget> {
    use BuiltinWidget::*;
    let widget = match (schema_type, alias) {
        ("boolean", "checkbox") => CheckboxWidget,
        ("boolean", "radio") => RadioWidget,
        ("boolean", "select") => SelectWidget,
        ("boolean", "hidden") => HiddenWidget,

        ("string", "text") => TextWidget,
        ("string", "password") => PasswordWidget,
        ("string", "email") => EmailWidget,
        ("string", "hostname") | ("string", "ipv4") | ("string", "ipv6") => TextWidget,
        ("string", "uri") => URLWidget,
        ("string", "data-url") | ("string", "file") => FileWidget,
        ("string", "radio") => RadioWidget,
        ("string", "select") => SelectWidget,
        ("string", "textarea") => TextareaWidget,
        ("string", "hidden") => HiddenWidget,
        ("string", "date") => DateWidget,
        ("string", "datetime") | ("string", "date-time") => DateTimeWidget,
        ("string", "alt-date") => AltDateWidget,
        ("string", "alt-datetime") => AltDateTimeWidget,
        ("string", "time") => TimeWidget,
        ("string", "color") => ColorWidget,

        ("number" | "integer", "text") => TextWidget,
        ("number" | "integer", "select") => SelectWidget,
        ("number" | "integer", "updown") => UpDownWidget,
        ("number" | "integer", "range") => RangeWidget,
        ("number" | "integer", "radio") => RadioWidget,
        ("number" | "integer", "hidden") => HiddenWidget,

        ("array", "select") => SelectWidget,
        ("array", "checkboxes") => CheckboxesWidget,
        ("array", "files") => FileWidget,
        ("array", "hidden") => HiddenWidget,
        _ => return None,
    };
    Some(widget)
}

/// The resolved set of components for one form instance.
#[derive(Debug, Clone)]
pub struct Registry {
    widgets: BTreeMap<String, WidgetRef>,
    fields: BTreeMap<String, FieldRef>,
    templates: BTreeMap<String, TemplateRef>,
    pub root_schema: Value,
    pub form_context: Value,
}

impl Registry {
    /// Built-ins merged with the host's overrides.
    pub fn new(root_schema: Value, overrides: &RegistryOverrides, form_context: Value) -> Self {
        let mut widgets: BTreeMap<String, WidgetRef> = BuiltinWidget::ALL
            .iter()
            .map(|w| (w.name().to_string(), Component::Builtin(*w)))
            .collect();
        let mut fields: BTreeMap<String, FieldRef> = BuiltinField::ALL
            .iter()
            .map(|f| (f.name().to_string(), Component::Builtin(*f)))
            .collect();
        let mut templates: BTreeMap<String, TemplateRef> = TemplateKind::ALL
            .iter()
            .map(|t| (t.name().to_string(), Component::Builtin(*t)))
            .collect();

        for (name, component) in &overrides.widgets {
            widgets.insert(name.clone(), Component::Custom(component.clone()));
        }
        for (name, component) in &overrides.fields {
            fields.insert(name.clone(), Component::Custom(component.clone()));
        }
        for (name, component) in &overrides.templates {
            templates.insert(name.clone(), Component::Custom(component.clone()));
        }

        Self {
            widgets,
            fields,
            templates,
            root_schema,
            form_context,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldRef> {
        self.fields.get(name)
    }

    /// The registered entry for a built-in field (possibly overridden).
    pub fn builtin_field(&self, field: BuiltinField) -> FieldRef {
        self.fields
            .get(field.name())
            .cloned()
            .unwrap_or(Component::Builtin(field))
    }

    /// The registered entry for a template kind (possibly overridden).
    pub fn template(&self, kind: TemplateKind) -> TemplateRef {
        self.templates
            .get(kind.name())
            .cloned()
            .unwrap_or(Component::Builtin(kind))
    }

    /// Template named by a `ui:*Template` override, falling back to `kind`
    /// (with a warning) when the name is not registered.
    pub fn template_override(&self, kind: TemplateKind, name: Option<&str>) -> TemplateRef {
        match name {
            Some(name) => match self.templates.get(name) {
                Some(template) => template.clone(),
                None => {
                    warn!(name, "unknown template in uiSchema; using {}", kind.name());
                    self.template(kind)
                }
            },
            None => self.template(kind),
        }
    }

    /// Resolve a `ui:widget` value (or a default alias) for a schema.
    ///
    /// A registered widget name wins; otherwise the alias is looked up for
    /// the schema's type.
    ///
    /// # Errors
    ///
    /// A message naming the widget and type when neither lookup succeeds.
    pub fn widget(&self, schema: &Value, widget: &str) -> Result<WidgetRef, String> {
        if let Some(component) = self.widgets.get(widget) {
            return Ok(component.clone());
        }
        let ty = schema_type(schema).unwrap_or("");
        match widget_alias(ty, widget) {
            Some(builtin) => Ok(self
                .widgets
                .get(builtin.name())
                .cloned()
                .unwrap_or(Component::Builtin(builtin))),
            None => Err(format!("No widget '{}' for type '{}'", widget, ty)),
        }
    }

    /// Whether `widget` resolves for the schema's type.
    pub fn has_widget(&self, schema: &Value, widget: &str) -> bool {
        self.widget(schema, widget).is_ok()
    }
}
