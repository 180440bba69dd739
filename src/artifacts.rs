//! Boundary types for build artifacts. The engine never touches the
//! filesystem; artifacts are opaque paths and tree expansion is delegated to
//! the caller through [ArtifactExpander].

use std::path::{Path, PathBuf};

/// A single build artifact, identified by its path in the execution root
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Artifact {
    exec_path: PathBuf,
}

impl Artifact {
    pub fn new(exec_path: impl Into<PathBuf>) -> Self {
        Self {
            exec_path: exec_path.into(),
        }
    }

    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    /// The path as a string, for use in command lines
    pub fn exec_path_string(&self) -> String {
        self.exec_path.to_string_lossy().into_owned()
    }
}

/// External collaborator that knows how to expand a tree artifact (a
/// directory) into its constituent files. Invoked synchronously during
/// expansion; pure from the engine's perspective.
pub trait ArtifactExpander {
    fn expand(&self, tree_artifact: &Artifact, out: &mut Vec<Artifact>);
}

/// The closed set of output categories a toolchain can name artifacts for.
/// The engine references categories only by their string name.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ArtifactCategory {
    StaticLibrary,
    AlwayslinkStaticLibrary,
    DynamicLibrary,
    VersionedDynamicLibrary,
    InterfaceLibrary,
    Executable,
    ObjectFile,
    PicObjectFile,
    CppModule,
    GeneratedAssembly,
    GeneratedHeader,
    ProcessedHeader,
    IncludedFileList,
}

impl ArtifactCategory {
    /// The name used to match against a toolchain's artifact name patterns
    pub fn category_name(self) -> &'static str {
        match self {
            Self::StaticLibrary => "static_library",
            Self::AlwayslinkStaticLibrary => "alwayslink_static_library",
            Self::DynamicLibrary => "dynamic_library",
            Self::VersionedDynamicLibrary => "versioned_dynamic_library",
            Self::InterfaceLibrary => "interface_library",
            Self::Executable => "executable",
            Self::ObjectFile => "object_file",
            Self::PicObjectFile => "pic_object_file",
            Self::CppModule => "cpp_module",
            Self::GeneratedAssembly => "generated_assembly",
            Self::GeneratedHeader => "generated_header",
            Self::ProcessedHeader => "processed_header",
            Self::IncludedFileList => "included_file_list",
        }
    }
}
