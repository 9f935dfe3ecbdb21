pub mod types;
pub mod parser;
pub mod parsers;
pub mod tree;
pub mod branches;
pub mod linear;

// Format detection and normalization
pub use parser::{load_export, load_export_file, normalize, ExportFormat, ParsedExport};

// Branch graph
pub use branches::{detect_branches, BranchGraph, BranchPolicy};
pub use tree::{BranchWarning, MessageTree};

// Current-branch selection
pub use linear::{available_branches, select_linear, BranchSelection, ROOT_BRANCH_POINT};
