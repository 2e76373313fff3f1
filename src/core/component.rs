//! The component tree: `BEGIN:X … END:X` blocks and their children.

use std::collections::BTreeMap;

use crate::behavior::{self, Behavior, BehaviorKind};
use crate::error::{Result, VObjectError};

use super::content_line::{ContentLine, normalize_name};
use super::value::Value;

/// A node of the parsed tree: either one content line or a nested component.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A single content line.
    Line(ContentLine),
    /// A nested component.
    Component(Component),
}

impl Node {
    /// The node's uppercased name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Line(line) => &line.name,
            Self::Component(comp) => &comp.name,
        }
    }

    /// The node's group prefix, if any.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Line(line) => line.group.as_deref(),
            Self::Component(comp) => comp.group.as_deref(),
        }
    }

    /// Whether this node is a component.
    #[must_use]
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component(_))
    }

    /// The line, if this node is one.
    #[must_use]
    pub fn as_line(&self) -> Option<&ContentLine> {
        match self {
            Self::Line(line) => Some(line),
            Self::Component(_) => None,
        }
    }

    /// Mutable access to the line, if this node is one.
    pub fn as_line_mut(&mut self) -> Option<&mut ContentLine> {
        match self {
            Self::Line(line) => Some(line),
            Self::Component(_) => None,
        }
    }

    /// The component, if this node is one.
    #[must_use]
    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Self::Component(comp) => Some(comp),
            Self::Line(_) => None,
        }
    }

    /// Mutable access to the component, if this node is one.
    pub fn as_component_mut(&mut self) -> Option<&mut Component> {
        match self {
            Self::Component(comp) => Some(comp),
            Self::Line(_) => None,
        }
    }

    /// The behavior bound to this node.
    #[must_use]
    pub fn behavior(&self) -> Option<&'static Behavior> {
        match self {
            Self::Line(line) => line.behavior,
            Self::Component(comp) => comp.behavior,
        }
    }

    /// Binds a behavior, cascading to descendants.
    ///
    /// Freshly bound lines still in on-wire form are decoded immediately.
    pub fn set_behavior(&mut self, b: &'static Behavior) -> Result<()> {
        match self {
            Self::Line(line) => {
                line.behavior = Some(b);
                if line.is_encoded() {
                    b.decode(line)?;
                }
            }
            Self::Component(comp) => comp.set_behavior(b)?,
        }
        Ok(())
    }

    /// Resolves this node's behavior from its parent's known children, or
    /// falls back to the parent's default line behavior.
    pub fn auto_behavior(&mut self, parent: &'static Behavior) -> Result<()> {
        if let Some(spec) = parent.known_child(self.name()) {
            if let Some(b) = behavior::get_behavior(self.name(), spec.version_hint) {
                return self.set_behavior(b);
            }
        } else if let Self::Line(line) = self {
            line.behavior = parent.default_line;
            if line.is_encoded()
                && let Some(b) = line.behavior
            {
                b.decode(line)?;
            }
        }
        Ok(())
    }

    /// Recursively converts values to their native representation.
    ///
    /// Transformation errors pick up the line number of the offending line.
    pub fn transform_to_native(&mut self) -> Result<()> {
        match self {
            Self::Line(line) => {
                if let Some(b) = line.behavior
                    && b.has_native
                    && !line.is_native()
                {
                    b.transform_to_native(line)
                        .map_err(|e| e.with_line_number(line.line_number))?;
                }
                Ok(())
            }
            Self::Component(comp) => comp.transform_to_native(),
        }
    }

    /// Recursively converts native values back to their on-wire form.
    pub fn transform_from_native(&mut self) -> Result<()> {
        match self {
            Self::Line(line) => {
                if let Some(b) = line.behavior
                    && b.has_native
                    && line.is_native()
                {
                    b.transform_from_native(line)
                        .map_err(|e| e.with_line_number(line.line_number))?;
                }
                Ok(())
            }
            Self::Component(comp) => comp.transform_from_native(),
        }
    }
}

impl From<ContentLine> for Node {
    fn from(line: ContentLine) -> Self {
        Self::Line(line)
    }
}

impl From<Component> for Node {
    fn from(comp: Component) -> Self {
        Self::Component(comp)
    }
}

/// A component: a named container of content lines and sub-components.
///
/// Children are keyed by lowercased name; insertion order is preserved
/// within each key. Serialization order is dictated by the behavior's
/// `sort_first` list followed by the remaining keys in sorted order.
#[derive(Debug, Clone, Default)]
pub struct Component {
    /// Uppercased component name; empty for unnamed top-level containers.
    pub name: String,
    /// Optional group prefix inherited from the BEGIN line.
    pub group: Option<String>,
    /// Whether `BEGIN:`/`END:` lines are emitted on serialization.
    pub use_begin: bool,
    /// The behavior bound to this component, when resolved.
    pub behavior: Option<&'static Behavior>,
    contents: BTreeMap<String, Vec<Node>>,
}

impl Component {
    /// Creates a named component.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            use_begin: true,
            ..Self::default()
        }
    }

    /// Creates an unnamed top-level container (no BEGIN/END on output).
    #[must_use]
    pub fn unnamed() -> Self {
        Self::default()
    }

    /// Assigns a PROFILE name to an unnamed component.
    ///
    /// ## Errors
    /// Fails if the component already has a name or uses BEGIN.
    pub fn set_profile(&mut self, name: &str) -> Result<()> {
        if !self.name.is_empty() || self.use_begin {
            if self.name == normalize_name(name) {
                return Ok(());
            }
            return Err(VObjectError::usage(
                "this component already has a PROFILE or uses BEGIN",
            ));
        }
        self.name = normalize_name(name);
        Ok(())
    }

    /// Read access to the raw contents map.
    #[must_use]
    pub fn contents(&self) -> &BTreeMap<String, Vec<Node>> {
        &self.contents
    }

    /// Number of children across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.values().map(Vec::len).sum()
    }

    /// Whether the component has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Whether any child with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.contents.contains_key(&name.to_ascii_lowercase())
    }

    /// The first child with this name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.contents
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
    }

    /// Mutable access to the first child with this name.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.contents
            .get_mut(&name.to_ascii_lowercase())
            .and_then(|v| v.first_mut())
    }

    /// All children with this name, in insertion order.
    #[must_use]
    pub fn children(&self, name: &str) -> &[Node] {
        self.contents
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Mutable access to all children with this name.
    pub fn children_mut(&mut self, name: &str) -> Option<&mut Vec<Node>> {
        self.contents.get_mut(&name.to_ascii_lowercase())
    }

    /// The first child line with this name.
    #[must_use]
    pub fn line(&self, name: &str) -> Option<&ContentLine> {
        self.child(name).and_then(Node::as_line)
    }

    /// Mutable access to the first child line with this name.
    pub fn line_mut(&mut self, name: &str) -> Option<&mut ContentLine> {
        self.child_mut(name).and_then(Node::as_line_mut)
    }

    /// The first child component with this name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.child(name).and_then(Node::as_component)
    }

    /// The first child line's value.
    #[must_use]
    pub fn child_value(&self, name: &str) -> Option<&Value> {
        self.line(name).map(|l| &l.value)
    }

    /// The first child line's textual value, when raw or decoded text.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child_value(name).and_then(Value::as_text)
    }

    /// All component children, in key order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.contents
            .values()
            .flatten()
            .filter_map(Node::as_component)
    }

    /// All line children, in key order.
    pub fn lines(&self) -> impl Iterator<Item = &ContentLine> {
        self.contents.values().flatten().filter_map(Node::as_line)
    }

    /// All children, in key order.
    pub fn all_children(&self) -> impl Iterator<Item = &Node> {
        self.contents.values().flatten()
    }

    /// Child keys in serialization order: `sort_first` names that are
    /// present, then the remaining keys sorted.
    #[must_use]
    pub fn sorted_child_keys(&self) -> Vec<String> {
        let sort_first: &[&str] = self.behavior.map_or(&[], |b| b.sort_first);
        let mut keys: Vec<String> = sort_first
            .iter()
            .filter(|k| self.contents.contains_key(**k))
            .map(|k| (*k).to_string())
            .collect();
        for key in self.contents.keys() {
            if !sort_first.contains(&key.as_str()) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Adds a child by name, inferring line versus component and behavior
    /// from this component's behavior. Returns the new node.
    pub fn add(&mut self, name: &str) -> &mut Node {
        let upper = normalize_name(name);
        let mut node = match self
            .behavior
            .and_then(|pb| pb.known_child(&upper))
            .and_then(|spec| behavior::get_behavior(&upper, spec.version_hint))
        {
            Some(b) if b.is_component => {
                let mut comp = Component::new(&upper);
                comp.behavior = Some(b);
                Node::Component(comp)
            }
            Some(b) => {
                let mut line = ContentLine::new(&upper);
                line.behavior = Some(b);
                Node::Line(line)
            }
            None => Node::Line(ContentLine::new(&upper)),
        };
        if let Node::Line(line) = &mut node
            && line.behavior.is_none()
            && let Some(pb) = self.behavior
        {
            line.behavior = pb.default_line;
        }
        self.push_node(node)
    }

    /// Adds a child line by name and returns it.
    ///
    /// Unlike [`Component::add`] the child is always a content line.
    pub fn add_line(&mut self, name: &str) -> &mut ContentLine {
        let upper = normalize_name(name);
        let mut line = ContentLine::new(&upper);
        line.behavior = self
            .behavior
            .and_then(|pb| pb.known_child(&upper))
            .and_then(|spec| behavior::get_behavior(&upper, spec.version_hint))
            .filter(|b| !b.is_component)
            .or_else(|| self.behavior.and_then(|pb| pb.default_line));
        match self.push_node(Node::Line(line)) {
            Node::Line(line) => line,
            Node::Component(_) => unreachable!("pushed a line"),
        }
    }

    /// Adds a child component by name and returns it.
    pub fn add_component(&mut self, name: &str) -> &mut Component {
        let upper = normalize_name(name);
        let mut comp = Component::new(&upper);
        comp.behavior = behavior::get_behavior(&upper, None).filter(|b| b.is_component);
        match self.push_node(Node::Component(comp)) {
            Node::Component(comp) => comp,
            Node::Line(_) => unreachable!("pushed a component"),
        }
    }

    /// Adds an existing node, cascading behavior from this component.
    ///
    /// ## Errors
    /// Propagates decode failures from newly bound lines.
    pub fn add_node(&mut self, mut node: Node) -> Result<&mut Node> {
        if let Some(pb) = self.behavior
            && node.behavior().is_none()
        {
            node.auto_behavior(pb)?;
            if let Node::Component(comp) = &mut node
                && let Some(b) = comp.behavior
            {
                comp.cascade_children(b)?;
            }
        }
        Ok(self.push_node(node))
    }

    fn push_node(&mut self, node: Node) -> &mut Node {
        let key = node.name().to_ascii_lowercase();
        let bucket = self.contents.entry(key).or_default();
        bucket.push(node);
        bucket.last_mut().expect("just pushed")
    }

    /// Removes the `index`-th child with this name, returning it.
    ///
    /// The key disappears when its last child is removed.
    pub fn remove_child(&mut self, name: &str, index: usize) -> Option<Node> {
        let key = name.to_ascii_lowercase();
        let bucket = self.contents.get_mut(&key)?;
        if index >= bucket.len() {
            return None;
        }
        let node = bucket.remove(index);
        if bucket.is_empty() {
            self.contents.remove(&key);
        }
        Some(node)
    }

    /// Removes every child with this name, returning them.
    pub fn remove_all(&mut self, name: &str) -> Vec<Node> {
        self.contents
            .remove(&name.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Binds a behavior to this component and cascades it to descendants.
    pub fn set_behavior(&mut self, b: &'static Behavior) -> Result<()> {
        self.behavior = Some(b);
        self.cascade_children(b)
    }

    fn cascade_children(&mut self, parent: &'static Behavior) -> Result<()> {
        let keys: Vec<String> = self.contents.keys().cloned().collect();
        for key in keys {
            if let Some(bucket) = self.contents.get_mut(&key) {
                for node in bucket {
                    node.auto_behavior(parent)?;
                    if let Node::Component(comp) = node
                        && let Some(b) = comp.behavior
                    {
                        comp.cascade_children(b)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Recursively converts child values to native representations, in
    /// `sort_first` order so that timezones resolve before recurrences.
    pub fn transform_to_native(&mut self) -> Result<()> {
        if let Some(b) = self.behavior
            && b.kind == BehaviorKind::Timezone
        {
            crate::tz::register_component_tzinfo(self);
        }
        for key in self.sorted_child_keys() {
            if let Some(bucket) = self.contents.get_mut(&key) {
                for node in bucket {
                    node.transform_to_native()?;
                }
            }
        }
        Ok(())
    }

    /// Recursively converts native child values back to on-wire form.
    pub fn transform_from_native(&mut self) -> Result<()> {
        for bucket in self.contents.values_mut() {
            for node in bucket {
                node.transform_from_native()?;
            }
        }
        Ok(())
    }

    /// Runs the bound behavior's validation.
    ///
    /// ## Errors
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<()> {
        match self.behavior {
            Some(b) => b.validate_component(self).map_err(VObjectError::from),
            None => Ok(()),
        }
    }

    /// Whether validation passes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Serializes this component to a string.
    ///
    /// Implicit parameters are generated first; with `validate` the tree is
    /// validated after generation. Lines are folded at `line_length` octets.
    ///
    /// ## Errors
    /// Propagates validation failures and native-to-text conversion errors.
    pub fn serialize(&mut self, line_length: usize, validate: bool) -> Result<String> {
        self.generate_implicits()?;
        if validate && self.behavior.is_some() {
            self.validate()?;
        }
        let mut buf = String::new();
        crate::build::serialize_component(self, &mut buf, line_length)?;
        Ok(buf)
    }

    /// Runs implicit-parameter generation on this component and every
    /// descendant component with a behavior.
    ///
    /// ## Errors
    /// Propagates timezone-synthesis failures.
    pub fn generate_implicits(&mut self) -> Result<()> {
        if let Some(b) = self.behavior {
            b.generate_implicit(self)?;
        }
        let keys: Vec<String> = self.contents.keys().cloned().collect();
        for key in keys {
            if let Some(bucket) = self.contents.get_mut(&key) {
                for node in bucket {
                    if let Node::Component(child) = node {
                        child.generate_implicits()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Serializes with the default 75-octet folding and validation on.
    ///
    /// ## Errors
    /// See [`Component::serialize`].
    pub fn serialize_default(&mut self) -> Result<String> {
        self.serialize(75, true)
    }
}

/// Structural equality on name and contents.
impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.contents == other.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_line_and_lookup() {
        let mut comp = Component::new("VEVENT");
        comp.add_line("summary").value = Value::Text("party".into());
        assert_eq!(comp.child_text("SUMMARY"), Some("party"));
        assert_eq!(comp.children("summary").len(), 1);
    }

    #[test]
    fn children_preserve_insertion_order() {
        let mut comp = Component::new("VFREEBUSY");
        comp.add_line("freebusy").value = Value::Text("a".into());
        comp.add_line("freebusy").value = Value::Text("b".into());
        let texts: Vec<_> = comp
            .children("freebusy")
            .iter()
            .filter_map(|n| n.as_line())
            .filter_map(|l| l.value.as_text())
            .collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[test]
    fn remove_child_drops_empty_key() {
        let mut comp = Component::new("VEVENT");
        comp.add_line("comment");
        assert!(comp.remove_child("COMMENT", 0).is_some());
        assert!(!comp.contains("comment"));
        assert!(comp.remove_child("comment", 0).is_none());
    }

    #[test]
    fn set_profile_only_on_unnamed() {
        let mut comp = Component::unnamed();
        comp.set_profile("VCARD").unwrap();
        assert_eq!(comp.name, "VCARD");
        let mut named = Component::new("VCALENDAR");
        assert!(named.set_profile("VCARD").is_err());
    }

    #[test]
    fn sorted_child_keys_without_behavior() {
        let mut comp = Component::new("X-THING");
        comp.add_line("zebra");
        comp.add_line("alpha");
        assert_eq!(comp.sorted_child_keys(), ["alpha", "zebra"]);
    }

    #[test]
    fn structural_equality() {
        let mut a = Component::new("VEVENT");
        a.add_line("summary").value = Value::Text("x".into());
        let mut b = Component::new("VEVENT");
        b.add_line("summary").value = Value::Text("x".into());
        assert_eq!(a, b);
    }
}
