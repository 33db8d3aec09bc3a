// Tagdict Library
// Exports core modules for use by the CLI binary

pub mod classify;
pub mod config;
pub mod dictionary;
pub mod hints;
pub mod interchange;
pub mod merge;
pub mod snapshot;
pub mod tagset;

// Re-export commonly used types for CLI
pub use dictionary::{
    Category, CategoryNode, Dictionary, DictionaryError, DictionaryStats, Tag, TagRef, TagRow,
    TagUpsert, TranslationReport, PATH_SEPARATOR, PLACEHOLDER_DESCRIPTION,
};

pub use hints::{hint, Hint, MatchedTag};

pub use merge::{merge, MergeOptions, MergeReport, MergeWarning};

pub use tagset::{random_set, AddOutcome, TagSet, TagSetEntry, DEFAULT_DELIMITER};

pub use classify::{CommitReport, PendingTag, Worklist};

pub use interchange::{
    export_pairs_csv, parse_pairs_csv, parse_tag_list, render_untranslated, InterchangeError,
};

pub use config::{init_app_data_dir, preferences_path, ConfigError, Preferences};

pub use snapshot::{
    default_dictionary_path, get_app_data_dir, import_dictionary, load_or_empty, load_snapshot,
    load_unvalidated, save_snapshot, seed_dictionary, snapshot_info, SnapshotError, SnapshotInfo,
    APP_IDENTIFIER,
};
