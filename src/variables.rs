//! Typed build variables and the hierarchical scopes they live in. Values
//! are immutable; scopes chain to an optional parent, with iteration
//! introducing single-binding child scopes.

use crate::{
    artifacts::{Artifact, ArtifactExpander},
    error::ExpansionError,
};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, OnceLock},
};

/// A single build variable value. Scalar views, sequence views, and field
/// access are each defined only on the matching variants; every other
/// variant answers with a type mismatch naming what was actually found.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableValue {
    String(String),
    Integer(i64),
    /// Sequence of plain strings, the common case for iteration
    StringSequence(Vec<String>),
    /// Sequence of arbitrary values
    Sequence(Vec<VariableValue>),
    /// Ordered field map, accessed with dotted names
    Structure(IndexMap<String, VariableValue>),
    /// Sequence of field maps, materialized into [VariableValue::Structure]
    /// values on iteration
    StructureSequence(Vec<IndexMap<String, VariableValue>>),
    /// String sequence produced on first demand by a pure supplier
    LazyStringSequence(LazyStringSequence),
    /// Specialized structure describing a library passed to the linker
    Library(LibraryToLink),
}

impl VariableValue {
    /// The type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::StringSequence(_)
            | Self::Sequence(_)
            | Self::StructureSequence(_)
            | Self::LazyStringSequence(_) => "sequence",
            Self::Structure(_) | Self::Library(_) => "structure",
        }
    }

    /// View this value as a single string, for splicing into a flag. Only
    /// strings and integers have a scalar view. `name` is the variable name,
    /// used in error messages.
    pub fn string_view(&self, name: &str) -> Result<String, ExpansionError> {
        match self {
            Self::String(value) => Ok(value.clone()),
            Self::Integer(value) => Ok(value.to_string()),
            other => Err(ExpansionError::TypeMismatch {
                name: name.to_owned(),
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// View this value as a sequence of values, for `iterate_over`.
    /// Structure sequences materialize their elements; lazy sequences run
    /// their supplier on the first call and cache the result.
    pub fn sequence_view(
        &self,
        name: &str,
        _expander: Option<&dyn ArtifactExpander>,
    ) -> Result<Vec<VariableValue>, ExpansionError> {
        match self {
            Self::StringSequence(values) => Ok(values
                .iter()
                .cloned()
                .map(VariableValue::String)
                .collect()),
            Self::Sequence(values) => Ok(values.clone()),
            Self::StructureSequence(structures) => Ok(structures
                .iter()
                .cloned()
                .map(VariableValue::Structure)
                .collect()),
            Self::LazyStringSequence(lazy) => Ok(lazy
                .materialize()
                .iter()
                .cloned()
                .map(VariableValue::String)
                .collect()),
            other => Err(ExpansionError::TypeMismatch {
                name: name.to_owned(),
                expected: "sequence",
                found: other.type_name(),
            }),
        }
    }

    /// Look up a field on a structure-typed value. An absent field is `None`
    /// (the caller decides whether that's an error); a non-structure value
    /// is a type mismatch. `path` is the dotted path resolved so far, used
    /// in error messages.
    pub fn field(
        &self,
        path: &str,
        field: &str,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<Option<VariableValue>, ExpansionError> {
        match self {
            Self::Structure(fields) => Ok(fields.get(field).cloned()),
            Self::Library(library) => Ok(library.field(field, expander)),
            other => Err(ExpansionError::TypeMismatch {
                name: path.to_owned(),
                expected: "structure",
                found: other.type_name(),
            }),
        }
    }

    /// Truthiness for `expand_if_true`/`expand_if_false` gates: non-empty
    /// for strings and all collection variants, nonzero for integers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::String(value) => !value.is_empty(),
            Self::Integer(value) => *value != 0,
            Self::StringSequence(values) => !values.is_empty(),
            Self::Sequence(values) => !values.is_empty(),
            Self::Structure(fields) => !fields.is_empty(),
            Self::StructureSequence(structures) => !structures.is_empty(),
            Self::LazyStringSequence(lazy) => !lazy.materialize().is_empty(),
            Self::Library(_) => true,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// A string sequence computed on first demand. The supplier must be pure;
/// its result is cached, and clones share the cache.
#[derive(Clone)]
pub struct LazyStringSequence {
    supplier: Arc<dyn Fn() -> Vec<String> + Send + Sync>,
    cache: Arc<OnceLock<Vec<String>>>,
}

impl LazyStringSequence {
    pub fn new(supplier: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            supplier: Arc::new(supplier),
            cache: Arc::new(OnceLock::new()),
        }
    }

    fn materialize(&self) -> &[String] {
        self.cache.get_or_init(|| (self.supplier)())
    }
}

impl Debug for LazyStringSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.cache.get() {
            Some(values) => {
                f.debug_tuple("LazyStringSequence").field(values).finish()
            }
            None => write!(f, "LazyStringSequence(<unevaluated>)"),
        }
    }
}

impl PartialEq for LazyStringSequence {
    fn eq(&self, other: &Self) -> bool {
        self.materialize() == other.materialize()
    }
}

/// The kind of library a [LibraryToLink] describes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LibraryType {
    ObjectFile,
    ObjectFileGroup,
    InterfaceLibrary,
    StaticLibrary,
    DynamicLibrary,
    VersionedDynamicLibrary,
}

impl LibraryType {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::ObjectFile => "object_file",
            Self::ObjectFileGroup => "object_file_group",
            Self::InterfaceLibrary => "interface_library",
            Self::StaticLibrary => "static_library",
            Self::DynamicLibrary => "dynamic_library",
            Self::VersionedDynamicLibrary => "versioned_dynamic_library",
        }
    }
}

/// Where a library's object files come from: an explicit list, or a tree
/// artifact expanded through the caller's [ArtifactExpander]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObjectFiles {
    List(Vec<String>),
    TreeArtifact(Artifact),
}

/// A library passed to the linker, exposed to templates as a structure with
/// the fields `name`, `object_files`, `type` and `is_whole_archive`
#[derive(Clone, Debug, PartialEq)]
pub struct LibraryToLink {
    name: Option<String>,
    object_files: Option<ObjectFiles>,
    library_type: LibraryType,
    is_whole_archive: bool,
}

impl LibraryToLink {
    pub fn new(
        name: Option<String>,
        object_files: Option<ObjectFiles>,
        library_type: LibraryType,
        is_whole_archive: bool,
    ) -> Self {
        Self {
            name,
            object_files,
            library_type,
            is_whole_archive,
        }
    }

    fn field(
        &self,
        field: &str,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Option<VariableValue> {
        match field {
            // Object file groups are anonymous
            "name" if self.library_type == LibraryType::ObjectFileGroup => {
                None
            }
            "name" => self.name.clone().map(VariableValue::String),
            "type" => Some(VariableValue::String(
                self.library_type.type_name().to_owned(),
            )),
            "is_whole_archive" => {
                Some(VariableValue::Integer(self.is_whole_archive.into()))
            }
            "object_files" => {
                let files = match self.object_files.as_ref()? {
                    ObjectFiles::List(files) => files.clone(),
                    ObjectFiles::TreeArtifact(tree) => match expander {
                        Some(expander) => {
                            let mut artifacts = Vec::new();
                            expander.expand(tree, &mut artifacts);
                            artifacts
                                .iter()
                                .map(Artifact::exec_path_string)
                                .collect()
                        }
                        // Without an expander the tree stands in for its
                        // contents
                        None => vec![tree.exec_path_string()],
                    },
                };
                Some(VariableValue::StringSequence(files))
            }
            _ => None,
        }
    }
}

/// An immutable name→value mapping with an optional parent scope. Bare
/// strings live in their own sub-mapping as a cheaper path alongside typed
/// values; lookup tries bare strings, then typed values, then the parent
/// chain. Dotted names fall back to structure field access: the longest
/// prefix that resolves as a flat lookup wins, and the stripped suffixes are
/// re-applied as fields.
#[derive(Clone, Debug, Default)]
pub struct VariableScope<'a> {
    strings: IndexMap<String, String>,
    values: IndexMap<String, VariableValue>,
    parent: Option<&'a VariableScope<'a>>,
}

impl VariableScope<'static> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> VariableScope<'a> {
    /// Bind a bare string variable
    pub fn insert_string(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.strings.insert(name.into(), value.into());
    }

    /// Bind a typed variable
    pub fn insert(&mut self, name: impl Into<String>, value: VariableValue) {
        self.values.insert(name.into(), value);
    }

    /// Create a child scope holding a single binding, shadowing `name` for
    /// the duration of one iteration step
    pub fn nested(
        &self,
        name: impl Into<String>,
        value: VariableValue,
    ) -> VariableScope<'_> {
        let mut values = IndexMap::with_capacity(1);
        values.insert(name.into(), value);
        VariableScope {
            strings: IndexMap::new(),
            values,
            parent: Some(self),
        }
    }

    /// Flat (non-dotted) lookup through the parent chain
    fn lookup(&self, name: &str) -> Option<VariableValue> {
        if let Some(value) = self.strings.get(name) {
            return Some(VariableValue::String(value.clone()));
        }
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.parent.and_then(|parent| parent.lookup(name))
    }

    /// Resolve a (possibly dotted) variable name. A dotted name like `a.b.c`
    /// can be either a flat variable named `a.b.c` or a structure `a` with
    /// field path `b.c`; the bare name wins when both exist.
    pub fn get(
        &self,
        name: &str,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<VariableValue, ExpansionError> {
        if let Some(value) = self.lookup(name) {
            return Ok(value);
        }

        // Strip dotted suffixes off the right until a prefix resolves, then
        // re-apply the suffixes as field accesses, outermost first
        let mut prefix = name;
        let mut suffixes: Vec<&str> = Vec::new();
        while let Some((head, tail)) = prefix.rsplit_once('.') {
            suffixes.push(tail);
            prefix = head;
            let Some(mut value) = self.lookup(prefix) else {
                continue;
            };
            let mut path = prefix.to_owned();
            for field in suffixes.iter().rev() {
                value = value.field(&path, field, expander)?.ok_or_else(|| {
                    ExpansionError::MissingField {
                        structure: path.clone(),
                        field: (*field).to_owned(),
                    }
                })?;
                path = format!("{path}.{field}");
            }
            return Ok(value);
        }

        Err(ExpansionError::UndefinedVariable(name.to_owned()))
    }

    /// Whether [Self::get] would succeed for this name
    pub fn is_available(
        &self,
        name: &str,
        expander: Option<&dyn ArtifactExpander>,
    ) -> bool {
        self.get(name, expander).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn structure<const N: usize>(
        fields: [(&str, VariableValue); N],
    ) -> VariableValue {
        VariableValue::Structure(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        )
    }

    fn strings<const N: usize>(values: [&str; N]) -> VariableValue {
        VariableValue::StringSequence(
            values.into_iter().map(str::to_owned).collect(),
        )
    }

    #[rstest]
    #[case::string_empty(VariableValue::from(""), false)]
    #[case::string_nonempty(VariableValue::from("x"), true)]
    #[case::integer_zero(VariableValue::Integer(0), false)]
    #[case::integer_nonzero(VariableValue::Integer(-3), true)]
    #[case::string_sequence_empty(strings([]), false)]
    #[case::string_sequence_nonempty(strings(["a"]), true)]
    #[case::sequence_empty(VariableValue::Sequence(vec![]), false)]
    #[case::sequence_nonempty(
        VariableValue::Sequence(vec![VariableValue::Integer(0)]),
        true
    )]
    #[case::structure_empty(structure([]), false)]
    #[case::structure_nonempty(structure([("f", VariableValue::Integer(0))]), true)]
    #[case::structure_sequence_empty(
        VariableValue::StructureSequence(vec![]),
        false
    )]
    #[case::lazy_empty(
        VariableValue::LazyStringSequence(LazyStringSequence::new(Vec::new)),
        false
    )]
    fn test_truthiness(#[case] value: VariableValue, #[case] expected: bool) {
        assert_eq!(value.is_truthy(), expected);
    }

    #[test]
    fn test_string_view() {
        assert_eq!(
            VariableValue::from("bar").string_view("v").unwrap(),
            "bar"
        );
        assert_eq!(
            VariableValue::Integer(42).string_view("v").unwrap(),
            "42"
        );
        assert_eq!(
            strings(["a"]).string_view("v").unwrap_err(),
            ExpansionError::TypeMismatch {
                name: "v".into(),
                expected: "string",
                found: "sequence",
            }
        );
    }

    #[test]
    fn test_sequence_view() {
        assert_eq!(
            strings(["a", "b"]).sequence_view("v", None).unwrap(),
            vec![VariableValue::from("a"), VariableValue::from("b")]
        );
        assert_eq!(
            VariableValue::StructureSequence(vec![
                [("f".to_owned(), VariableValue::Integer(1))]
                    .into_iter()
                    .collect()
            ])
            .sequence_view("v", None)
            .unwrap(),
            vec![structure([("f", VariableValue::Integer(1))])]
        );
        assert_eq!(
            VariableValue::from("x").sequence_view("v", None).unwrap_err(),
            ExpansionError::TypeMismatch {
                name: "v".into(),
                expected: "sequence",
                found: "string",
            }
        );
    }

    #[test]
    fn test_lazy_sequence_materializes_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let lazy = LazyStringSequence::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            vec!["a".to_owned()]
        });
        let value = VariableValue::LazyStringSequence(lazy);

        assert_eq!(
            value.sequence_view("v", None).unwrap(),
            vec![VariableValue::from("a")]
        );
        assert!(value.is_truthy());
        assert_eq!(
            value.sequence_view("v", None).unwrap(),
            vec![VariableValue::from("a")]
        );
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_library_fields() {
        let library = LibraryToLink::new(
            Some("libz".into()),
            Some(ObjectFiles::List(vec!["z1.o".into(), "z2.o".into()])),
            LibraryType::StaticLibrary,
            true,
        );
        let value = VariableValue::Library(library);

        assert_eq!(
            value.field("lib", "name", None).unwrap(),
            Some(VariableValue::from("libz"))
        );
        assert_eq!(
            value.field("lib", "type", None).unwrap(),
            Some(VariableValue::from("static_library"))
        );
        assert_eq!(
            value.field("lib", "is_whole_archive", None).unwrap(),
            Some(VariableValue::Integer(1))
        );
        assert_eq!(
            value.field("lib", "object_files", None).unwrap(),
            Some(strings(["z1.o", "z2.o"]))
        );
        assert_eq!(value.field("lib", "bogus", None).unwrap(), None);
    }

    #[test]
    fn test_library_object_file_group_has_no_name() {
        let value = VariableValue::Library(LibraryToLink::new(
            Some("ignored".into()),
            None,
            LibraryType::ObjectFileGroup,
            false,
        ));
        assert_eq!(value.field("lib", "name", None).unwrap(), None);
    }

    #[test]
    fn test_library_tree_artifact_object_files() {
        struct Fixed;
        impl ArtifactExpander for Fixed {
            fn expand(&self, tree: &Artifact, out: &mut Vec<Artifact>) {
                out.push(Artifact::new(tree.exec_path().join("a.o")));
                out.push(Artifact::new(tree.exec_path().join("b.o")));
            }
        }

        let value = VariableValue::Library(LibraryToLink::new(
            None,
            Some(ObjectFiles::TreeArtifact(Artifact::new("objs"))),
            LibraryType::ObjectFileGroup,
            false,
        ));

        assert_eq!(
            value.field("lib", "object_files", Some(&Fixed)).unwrap(),
            Some(strings(["objs/a.o", "objs/b.o"]))
        );
        // Without an expander, the tree artifact itself stands in
        assert_eq!(
            value.field("lib", "object_files", None).unwrap(),
            Some(strings(["objs"]))
        );
    }

    #[test]
    fn test_field_on_non_structure() {
        assert_eq!(
            VariableValue::from("x").field("v", "f", None).unwrap_err(),
            ExpansionError::TypeMismatch {
                name: "v".into(),
                expected: "structure",
                found: "string",
            }
        );
    }

    #[test]
    fn test_scope_bare_strings_shadow_typed() {
        let mut scope = VariableScope::new();
        scope.insert("x", VariableValue::Integer(1));
        scope.insert_string("x", "bare");
        assert_eq!(
            scope.get("x", None).unwrap(),
            VariableValue::from("bare")
        );
    }

    #[test]
    fn test_scope_parent_chain() {
        let mut parent = VariableScope::new();
        parent.insert_string("a", "from parent");
        parent.insert_string("b", "from parent");
        let child = parent.nested("b", VariableValue::from("from child"));

        assert_eq!(
            child.get("a", None).unwrap(),
            VariableValue::from("from parent")
        );
        assert_eq!(
            child.get("b", None).unwrap(),
            VariableValue::from("from child")
        );
        // The original binding is untouched
        assert_eq!(
            parent.get("b", None).unwrap(),
            VariableValue::from("from parent")
        );
    }

    #[test]
    fn test_scope_missing_variable() {
        let scope = VariableScope::new();
        assert_eq!(
            scope.get("nope", None).unwrap_err(),
            ExpansionError::UndefinedVariable("nope".into())
        );
        assert!(!scope.is_available("nope", None));
    }

    #[test]
    fn test_scope_dotted_lookup() {
        let mut scope = VariableScope::new();
        scope.insert(
            "lib",
            structure([
                ("name", VariableValue::from("libz")),
                (
                    "inner",
                    structure([("depth", VariableValue::Integer(2))]),
                ),
            ]),
        );

        assert_eq!(
            scope.get("lib.name", None).unwrap(),
            VariableValue::from("libz")
        );
        assert_eq!(
            scope.get("lib.inner.depth", None).unwrap(),
            VariableValue::Integer(2)
        );
        assert_eq!(
            scope.get("lib.bogus", None).unwrap_err(),
            ExpansionError::MissingField {
                structure: "lib".into(),
                field: "bogus".into(),
            }
        );
        assert_eq!(
            scope.get("lib.inner.bogus", None).unwrap_err(),
            ExpansionError::MissingField {
                structure: "lib.inner".into(),
                field: "bogus".into(),
            }
        );
        // No prefix resolves at all: report the full name
        assert_eq!(
            scope.get("other.name", None).unwrap_err(),
            ExpansionError::UndefinedVariable("other.name".into())
        );
    }

    #[test]
    fn test_scope_flat_name_beats_structure_field() {
        let mut scope = VariableScope::new();
        scope.insert_string("a.b", "flat");
        scope.insert("a", structure([("b", VariableValue::from("nested"))]));
        assert_eq!(
            scope.get("a.b", None).unwrap(),
            VariableValue::from("flat")
        );
    }

    #[rstest]
    #[case("lib", true)]
    #[case("lib.name", true)]
    #[case("lib.bogus", false)]
    #[case("missing", false)]
    fn test_is_available_matches_get(
        #[case] name: &str,
        #[case] expected: bool,
    ) {
        let mut scope = VariableScope::new();
        scope.insert("lib", structure([("name", VariableValue::from("z"))]));
        assert_eq!(scope.is_available(name, None), expected);
        assert_eq!(scope.get(name, None).is_ok(), expected);
    }
}
