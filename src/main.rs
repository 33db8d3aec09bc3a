//! Tagdict CLI
//!
//! Command-line interface for the bilingual tag dictionary: category and tag
//! management, classification, merging, interchange files and tag sets.
//! Results are printed to stdout as JSON; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tagdict_lib::{
    // Dictionary
    Dictionary, DictionaryError, TagRow,
    // Classification
    hint, parse_tag_list, Worklist,
    // Merge
    load_unvalidated, merge,
    // Interchange
    export_pairs_csv, parse_pairs_csv, render_untranslated,
    // Tag sets
    random_set, TagSet, TagSetEntry,
    // Persistence and config
    import_dictionary, init_app_data_dir, load_snapshot, preferences_path, save_snapshot,
    seed_dictionary, snapshot_info, Preferences,
};

/// Environment variable holding the log filter; `RUST_LOG` is the fallback
const LOG_ENV: &str = "TAGDICT_LOG";

#[derive(Parser)]
#[command(name = "tagdict")]
#[command(about = "Tagdict CLI - English/Japanese tag dictionary", long_about = None)]
struct Cli {
    /// Dictionary file (overrides the configured one)
    #[arg(long, global = true)]
    dict: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and an empty (or seeded) dictionary
    Init {
        /// Start from the built-in demo dictionary
        #[arg(long)]
        seed: bool,
        /// Overwrite an existing dictionary file
        #[arg(long)]
        force: bool,
    },
    /// Show dictionary file and summary counts
    Info,
    /// Category management commands
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Tag management commands
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Suggest categories for a tag
    Hint {
        tag: String,
    },
    /// Build a classification worklist from new tags and optionally commit it
    Classify {
        /// Tags, comma or newline separated (in addition to --file)
        tags: Vec<String>,
        /// Read tags from a text file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Assign every row to this category path
        #[arg(short, long)]
        assign: Option<String>,
        /// Write assigned rows to the dictionary
        #[arg(long)]
        commit: bool,
    },
    /// Merge another dictionary file into this one
    Merge {
        file: PathBuf,
    },
    /// Export commands
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },
    /// Import commands
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },
    /// Tag-set commands
    Set {
        #[command(subcommand)]
        action: SetAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Add a category
    Add {
        name: String,
        /// Parent category (id or display path)
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Delete an empty leaf category (id or display path)
    Delete {
        category: String,
    },
    /// Print the category tree
    Tree {
        /// Keep only subtrees whose names or tags match
        #[arg(short, long)]
        query: Option<String>,
    },
    /// List leaf categories
    Leaves,
    /// Resolve a category id to its display path
    Path {
        id: String,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Add a tag, or update the description of an existing one
    Add {
        en: String,
        /// Japanese description
        #[arg(short, long, default_value = "")]
        ja: String,
        /// Target category (id or display path)
        #[arg(short, long)]
        category: String,
    },
    /// Delete tags by English name
    Delete {
        #[arg(required = true)]
        en: Vec<String>,
    },
    /// Search tags by English name or description
    Search {
        #[arg(default_value = "")]
        query: String,
        /// Restrict to a category subtree (id or display path)
        #[arg(short, long)]
        under: Option<String>,
    },
    /// List tags without a description
    Untranslated,
}

#[derive(Subcommand)]
enum ExportAction {
    /// All tags as an `English Tag,日本語説明` CSV
    Csv {
        out: PathBuf,
    },
    /// Untranslated tag names, one per line
    Untranslated {
        out: PathBuf,
    },
    /// The whole dictionary in snapshot format
    Json {
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Overwrite descriptions from a translated CSV
    Translations {
        csv: PathBuf,
    },
    /// Replace the dictionary with a snapshot file, after checking it
    Dictionary {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SetAction {
    /// Render the given tags as one delimited line
    Render {
        #[arg(required = true)]
        en: Vec<String>,
        #[arg(short, long)]
        delimiter: Option<String>,
    },
    /// Pick one random tag from every leaf category
    Random {
        #[arg(short, long)]
        delimiter: Option<String>,
        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },
}

// ============ Output Types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitOutput {
    path: String,
    categories: usize,
    tags: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoOutput {
    #[serde(flatten)]
    snapshot: tagdict_lib::SnapshotInfo,
    preferences: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryOutput {
    id: String,
    name: String,
    path: String,
    tag_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountOutput {
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportOutput {
    path: String,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HintOutput {
    confidence: f32,
    label: &'static str,
    #[serde(flatten)]
    hint: tagdict_lib::Hint,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyOutput {
    worklist: Worklist,
    #[serde(skip_serializing_if = "Option::is_none")]
    committed: Option<tagdict_lib::CommitReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetOutput {
    text: String,
    entries: Vec<TagSetEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unknown: Vec<String>,
}

// ============ Main ============

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolved dictionary location plus preferences for one invocation
struct Workspace {
    path: PathBuf,
    prefs: Preferences,
}

impl Workspace {
    fn open(dict: Option<&Path>) -> Result<Self> {
        let prefs = match preferences_path() {
            Ok(path) => Preferences::load(&path)
                .with_context(|| format!("Failed to read preferences {}", path.display()))?,
            Err(e) => {
                warn!(error = %e, "No app data directory; using default preferences");
                Preferences::default()
            }
        };
        let path = prefs.dictionary_path(dict)?;
        debug!(path = ?path, "Using dictionary");
        Ok(Self { path, prefs })
    }

    fn load(&self) -> Result<Dictionary> {
        load_snapshot(&self.path)
            .with_context(|| format!("Failed to load dictionary {}", self.path.display()))
    }

    fn save(&self, dictionary: &Dictionary) -> Result<()> {
        save_snapshot(&self.path, dictionary)
            .with_context(|| format!("Failed to save dictionary {}", self.path.display()))
    }

    fn delimiter(&self, flag: Option<String>) -> String {
        flag.unwrap_or_else(|| self.prefs.delimiter.clone())
    }
}

fn run(cli: Cli) -> Result<String> {
    let workspace = Workspace::open(cli.dict.as_deref())?;

    match cli.command {
        Commands::Init { seed, force } => handle_init(&workspace, seed, force),
        Commands::Info => {
            let dictionary = workspace.load()?;
            let output = InfoOutput {
                snapshot: snapshot_info(&workspace.path, &dictionary),
                preferences: preferences_path().ok().map(|p| p.display().to_string()),
            };
            Ok(serde_json::to_string(&output)?)
        }
        Commands::Category { action } => handle_category(&workspace, action),
        Commands::Tag { action } => handle_tag(&workspace, action),
        Commands::Hint { tag } => {
            let dictionary = workspace.load()?;
            let hints: Vec<HintOutput> = hint(&dictionary, &tag)
                .into_iter()
                .map(|hint| HintOutput {
                    confidence: hint.confidence(),
                    label: hint.label(),
                    hint,
                })
                .collect();
            Ok(serde_json::to_string(&hints)?)
        }
        Commands::Classify {
            tags,
            file,
            assign,
            commit,
        } => handle_classify(&workspace, tags, file, assign, commit),
        Commands::Merge { file } => {
            let mut dictionary = workspace.load()?;
            let foreign = load_unvalidated(&file)
                .with_context(|| format!("Failed to read import file {}", file.display()))?;
            let report = merge(&mut dictionary, &foreign, &workspace.prefs.merge_options());
            if !report.is_noop() {
                workspace.save(&dictionary)?;
            }
            Ok(serde_json::to_string(&report)?)
        }
        Commands::Export { action } => handle_export(&workspace, action),
        Commands::Import { action } => handle_import(&workspace, action),
        Commands::Set { action } => handle_set(&workspace, action),
    }
}

// ============ Handlers ============

fn handle_init(workspace: &Workspace, seed: bool, force: bool) -> Result<String> {
    if let Err(e) = init_app_data_dir() {
        warn!(error = %e, "Failed to initialize app data directory");
    }

    if workspace.path.exists() && !force {
        bail!(
            "Dictionary already exists at {} (use --force to overwrite)",
            workspace.path.display()
        );
    }

    let dictionary = if seed { seed_dictionary()? } else { Dictionary::new() };
    workspace.save(&dictionary)?;

    let output = InitOutput {
        path: workspace.path.display().to_string(),
        categories: dictionary.categories.len(),
        tags: dictionary.tag_count(),
    };
    Ok(serde_json::to_string(&output)?)
}

fn handle_category(workspace: &Workspace, action: CategoryAction) -> Result<String> {
    let mut dictionary = workspace.load()?;

    match action {
        CategoryAction::Add { name, parent } => {
            let parent_id = parent
                .as_deref()
                .map(|p| resolve_category(&dictionary, p))
                .transpose()?;
            let category = dictionary.add_category(&name, parent_id.as_deref())?;
            workspace.save(&dictionary)?;
            Ok(serde_json::to_string(&describe(&dictionary, &category.id)?)?)
        }

        CategoryAction::Delete { category } => {
            let id = resolve_category(&dictionary, &category)?;
            let removed = dictionary.delete_category(&id)?;
            workspace.save(&dictionary)?;
            Ok(serde_json::to_string(&removed)?)
        }

        CategoryAction::Tree { query } => {
            Ok(serde_json::to_string(&dictionary.outline(query.as_deref()))?)
        }

        CategoryAction::Leaves => {
            let leaves = dictionary
                .leaves()
                .iter()
                .map(|leaf| describe(&dictionary, &leaf.id))
                .collect::<Result<Vec<_>>>()?;
            Ok(serde_json::to_string(&leaves)?)
        }

        CategoryAction::Path { id } => {
            if dictionary.find_by_id(&id).is_none() {
                return Err(DictionaryError::CategoryNotFound(id).into());
            }
            Ok(serde_json::to_string(&describe(&dictionary, &id)?)?)
        }
    }
}

fn handle_tag(workspace: &Workspace, action: TagAction) -> Result<String> {
    let mut dictionary = workspace.load()?;

    match action {
        TagAction::Add { en, ja, category } => {
            let category_id = resolve_category(&dictionary, &category)?;
            let outcome = dictionary.add_or_update(&category_id, &en, &ja)?;
            workspace.save(&dictionary)?;
            Ok(serde_json::to_string(&outcome)?)
        }

        TagAction::Delete { en } => {
            let count = dictionary.delete_by_en_set(&en);
            if count > 0 {
                workspace.save(&dictionary)?;
            }
            Ok(serde_json::to_string(&CountOutput { count })?)
        }

        TagAction::Search { query, under } => {
            let under = under
                .as_deref()
                .map(|u| resolve_category(&dictionary, u))
                .transpose()?;
            let rows: Vec<TagRow> = dictionary.search_tags(&query, under.as_deref())?;
            Ok(serde_json::to_string(&rows)?)
        }

        TagAction::Untranslated => {
            let names: Vec<&str> = dictionary
                .untranslated()
                .iter()
                .map(|t| t.en.as_str())
                .collect();
            Ok(serde_json::to_string(&names)?)
        }
    }
}

fn handle_classify(
    workspace: &Workspace,
    tags: Vec<String>,
    file: Option<PathBuf>,
    assign: Option<String>,
    commit: bool,
) -> Result<String> {
    let mut raw: Vec<String> = tags.iter().flat_map(|t| parse_tag_list(t)).collect();
    if let Some(file) = file {
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read tag list {}", file.display()))?;
        raw.extend(parse_tag_list(&content));
    }
    if raw.is_empty() {
        bail!("No tags given (pass tags or --file)");
    }

    let mut dictionary = workspace.load()?;
    let mut worklist = Worklist::from_raw(&dictionary, &raw);
    if let Some(path) = assign {
        worklist.assign_all(&path);
    }

    let committed = if commit {
        let report = worklist.commit(&mut dictionary);
        if report.added + report.updated > 0 {
            workspace.save(&dictionary)?;
        }
        Some(report)
    } else {
        None
    };

    Ok(serde_json::to_string(&ClassifyOutput {
        worklist,
        committed,
    })?)
}

fn handle_export(workspace: &Workspace, action: ExportAction) -> Result<String> {
    let dictionary = workspace.load()?;

    let (out, count) = match action {
        ExportAction::Csv { out } => {
            write_file(&out, export_pairs_csv(&dictionary))?;
            (out, dictionary.tag_count())
        }
        ExportAction::Untranslated { out } => {
            write_file(&out, render_untranslated(&dictionary))?;
            (out, dictionary.untranslated().len())
        }
        ExportAction::Json { out } => {
            save_snapshot(&out, &dictionary)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            (out, dictionary.categories.len())
        }
    };

    Ok(serde_json::to_string(&ExportOutput {
        path: out.display().to_string(),
        count,
    })?)
}

fn write_file(out: &Path, contents: String) -> Result<()> {
    fs::write(out, contents).with_context(|| format!("Failed to write {}", out.display()))
}

fn handle_import(workspace: &Workspace, action: ImportAction) -> Result<String> {
    match action {
        ImportAction::Translations { csv } => {
            let text = fs::read_to_string(&csv)
                .with_context(|| format!("Failed to read {}", csv.display()))?;
            let pairs = parse_pairs_csv(&text)?;

            let mut dictionary = workspace.load()?;
            let report = dictionary.import_translations(pairs);
            if report.updated > 0 {
                workspace.save(&dictionary)?;
            }
            Ok(serde_json::to_string(&report)?)
        }
        ImportAction::Dictionary { file } => {
            let dictionary = import_dictionary(&file)
                .with_context(|| format!("Failed to import dictionary {}", file.display()))?;
            workspace.save(&dictionary)?;
            Ok(serde_json::to_string(&InitOutput {
                path: workspace.path.display().to_string(),
                categories: dictionary.categories.len(),
                tags: dictionary.tag_count(),
            })?)
        }
    }
}

fn handle_set(workspace: &Workspace, action: SetAction) -> Result<String> {
    let dictionary = workspace.load()?;
    let mut set = TagSet::new();
    let mut unknown = Vec::new();

    let delimiter = match action {
        SetAction::Render { en, delimiter } => {
            for name in en.iter().flat_map(|e| parse_tag_list(e)) {
                let entry = match dictionary.find_tag(&name) {
                    Some(found) => TagSetEntry {
                        en: found.tag.en.clone(),
                        ja: found.tag.ja.clone(),
                        category_path: dictionary.path(found.category_id)?,
                    },
                    None => {
                        unknown.push(name.clone());
                        TagSetEntry {
                            en: name,
                            ja: String::new(),
                            category_path: String::new(),
                        }
                    }
                };
                set.add(entry);
            }
            workspace.delimiter(delimiter)
        }

        SetAction::Random { delimiter, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            set.replace_all(random_set(&dictionary, &mut rng)?);
            workspace.delimiter(delimiter)
        }
    };

    Ok(serde_json::to_string(&SetOutput {
        text: set.render(&delimiter),
        entries: set.entries().to_vec(),
        unknown,
    })?)
}

// ============ Helpers ============

/// Accept a category id or a display path such as `服装 / 状態`
fn resolve_category(dictionary: &Dictionary, reference: &str) -> Result<String> {
    let reference = reference.trim();
    if dictionary.find_by_id(reference).is_some() {
        return Ok(reference.to_string());
    }
    dictionary
        .resolve_path(reference)
        .ok_or_else(|| DictionaryError::CategoryNotFound(reference.to_string()).into())
}

fn describe(dictionary: &Dictionary, id: &str) -> Result<CategoryOutput> {
    let category = dictionary
        .find_by_id(id)
        .ok_or_else(|| DictionaryError::CategoryNotFound(id.to_string()))?;
    Ok(CategoryOutput {
        id: category.id.clone(),
        name: category.name.clone(),
        path: dictionary.path(id)?,
        tag_count: category.tags.len(),
    })
}
