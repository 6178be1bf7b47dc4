use clap::{Parser, Subcommand};
use clipbook::book::{Book, BookError, ROOT_ID, TreeLock};
use clipbook::output::Reporter;
use clipbook::{classify, config, favicon, generate, indexer};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup — trivial, called exactly once
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "clipbook")]
#[command(about = "Manage a hierarchical archive of captured web pages")]
#[command(long_about = "\
Manage a hierarchical archive of captured web pages

A book is a directory of captured files plus a support directory holding
everything derived from them:

  book/
  ├── .clipbook/
  │   ├── config.toml               # Book config (optional)
  │   ├── tree/
  │   │   ├── meta.json             # Item descriptors
  │   │   ├── toc.json              # Tree structure
  │   │   ├── favicon/              # Content-addressed icon cache
  │   │   └── map.html, ...         # Generated site
  │   └── backup/                   # One session per mutating run
  ├── 20200101000000000/index.html  # Captured page (folder form)
  ├── 20200101000000001.htz         # Captured page (zip archive)
  └── notes.html

Typical flow:

  clipbook index                    # describe captured files as items
  clipbook favicons --archives      # cache the icons items reference
  clipbook build                    # render the map/frame/search site

Metadata resolution (first available wins):
  Title:   data-clipbook-title attribute → capture banner → <title> → source URL
  Create:  data-clipbook-create attribute → capture banner → timestamp filename
  Icon:    data-clipbook-icon attribute → first <link rel=\"icon\">

Run 'clipbook gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Book root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Also show per-step debug events
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive item descriptors for captured files
    Index {
        /// Files or directories to index (default: every web document under
        /// the data directory)
        paths: Vec<PathBuf>,

        /// Do not fetch favicons over the network
        #[arg(long)]
        no_network: bool,
    },
    /// Resolve and cache the favicons items reference
    Favicons {
        /// Item ids to process (default: every item)
        ids: Vec<String>,

        /// Skip absolute-URL icons
        #[arg(long)]
        no_url: bool,

        /// Also extract icons stored inside htz/maff archives
        #[arg(long)]
        archives: bool,

        /// Also cache icons referenced as plain relative files
        #[arg(long)]
        files: bool,
    },
    /// Generate the static site for the tree
    Build {
        /// Also emit index.html, a script-free static listing
        #[arg(long, overrides_with = "no_static_index")]
        static_index: bool,

        /// Skip index.html even if the book config enables it
        #[arg(long)]
        no_static_index: bool,

        /// UI language of generated pages (e.g. en, zh_TW)
        #[arg(long)]
        locale: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match run(cli)? {
        0 => Ok(()),
        1 => Err("1 operation failed".into()),
        n => Err(format!("{n} operations failed").into()),
    }
}

fn run(cli: Cli) -> Result<usize, Box<dyn std::error::Error>> {
    let mut reporter = Reporter::new(cli.verbose);

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Index { paths, no_network } => {
            let (mut book, _lock) = open_book(&cli.root)?;
            ensure_tree(&book)?;
            let files = collect_files(&book, &paths);
            let options = indexer::IndexOptions {
                cache_url: book.config.favicon.cache_url && !no_network,
                ..indexer::IndexOptions::default()
            };
            let fetcher = favicon::HttpFetcher::new()?;
            let mut run = indexer::index_files(&mut book, files, options, &fetcher);
            for event in run.by_ref() {
                reporter.report(&event);
            }
            let indexed = run.indexed().to_vec();
            drop(run);

            // New items land at the end of the root list; items already
            // placed somewhere in the tree stay where they are.
            for id in &indexed {
                if !book.toc.is_listed(id) {
                    book.toc.push_child(ROOT_ID, id.clone());
                }
            }
            book.save_meta()?;
            book.save_toc()?;
        }
        Command::Favicons { ids, no_url, archives, files } => {
            let (mut book, _lock) = open_book(&cli.root)?;
            ensure_tree(&book)?;
            let mut options = book.config.favicon.clone();
            if no_url {
                options.cache_url = false;
            }
            if archives {
                options.cache_archive = true;
            }
            if files {
                options.cache_file = true;
            }
            let fetcher = favicon::HttpFetcher::new()?;
            let ids = if ids.is_empty() { None } else { Some(ids) };
            for event in favicon::cache_favicons(&mut book, ids, options, &fetcher) {
                reporter.report(&event);
            }
            book.save_meta()?;
        }
        Command::Build { static_index, no_static_index, locale } => {
            let (mut book, _lock) = open_book(&cli.root)?;
            let options = generate::BuildOptions {
                static_index: !no_static_index
                    && (static_index || book.config.build.static_index),
                locale: locale.unwrap_or_else(|| book.config.locale.clone()),
            };
            for event in generate::build_site(&mut book, options) {
                reporter.report(&event);
            }
        }
    }

    Ok(reporter.failures())
}

/// Open the book, take the tree lock, and load descriptors.
///
/// The lock must stay alive until the command's saves are done; callers
/// bind it alongside the book.
fn open_book(root: &Path) -> Result<(Book, TreeLock), BookError> {
    let mut book = Book::open(root)?;
    let lock = TreeLock::acquire(&book)?;
    if !book.config.no_tree {
        book.load_meta()?;
        book.load_toc()?;
    }
    Ok((book, lock))
}

fn ensure_tree(book: &Book) -> Result<(), BookError> {
    if book.config.no_tree {
        return Err(BookError::NoTree);
    }
    Ok(())
}

/// Resolve the `index` command's path arguments to a file list.
///
/// No arguments means every web document under the data directory.
/// Directory arguments are scanned the same way; file arguments pass
/// through untouched, so non-web files can be indexed deliberately.
fn collect_files(book: &Book, paths: &[PathBuf]) -> Vec<PathBuf> {
    if paths.is_empty() {
        return scan_dir(&book.data_dir());
    }
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_dir(path));
        } else {
            files.push(path.clone());
        }
    }
    files
}

/// Web documents under `dir` in stable filename order, skipping the
/// support directory.
fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != clipbook::book::SUPPORT_DIR)
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| classify::is_web_document(path))
        .collect()
}
