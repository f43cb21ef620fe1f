//! Attribute sets for generated DOM elements
//!
//! An [`AttributeSpec`] maps attribute names to a value expression and an
//! optional guard expression. Rendering preserves insertion order: later
//! lines may read side effects of earlier ones, e.g. a cross-origin guard
//! that inspects the freshly assigned `src`.
//!
//! Expressions are emitted verbatim. Callers pre-serialize string literals.

use indexmap::IndexMap;

/// Value expression plus optional runtime guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub value: String,
    pub guard: Option<String>,
}

/// Ordered attribute name -> expression mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSpec {
    attributes: IndexMap<String, AttributeValue>,
}

impl AttributeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always assign `value`
    ///
    /// Overriding an existing attribute keeps its original position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(
            name.into(),
            AttributeValue {
                value: value.into(),
                guard: None,
            },
        );
        self
    }

    /// Assign `value` only when `guard` is truthy at runtime
    pub fn set_guarded(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        guard: impl Into<String>,
    ) -> &mut Self {
        self.attributes.insert(
            name.into(),
            AttributeValue {
                value: value.into(),
                guard: Some(guard.into()),
            },
        );
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Render one assignment statement per attribute, in insertion order
pub fn render_attributes(target: &str, spec: &AttributeSpec) -> Vec<String> {
    spec.iter()
        .map(|(name, attr)| {
            let assignment = format!("{}.{} = {};", target, name, attr.value);
            match &attr.guard {
                Some(guard) => format!("if ({}) {}", guard, assignment),
                None => assignment,
            }
        })
        .collect()
}

/// A DOM element about to be created, as seen by the `mutate_tag` hook
///
/// Plugins may rewrite the attributes or substitute the creation
/// expression altogether.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    /// Element tag, e.g. `script` or `link`
    pub tag_name: String,

    /// Expression producing the element
    pub create_expr: String,

    /// Attributes assigned after creation
    pub attributes: AttributeSpec,
}

impl TagSpec {
    /// A tag created with `document.createElement`
    pub fn element(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            create_expr: format!("document.createElement('{}')", tag_name),
            attributes: AttributeSpec::new(),
        }
    }

    /// Declaration of `var_name` followed by the attribute assignments
    pub fn render(&self, var_name: &str) -> Vec<String> {
        let mut lines = vec![format!("var {} = {};", var_name, self.create_expr)];
        lines.extend(render_attributes(var_name, &self.attributes));
        lines
    }
}
