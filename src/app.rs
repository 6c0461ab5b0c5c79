use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::args::{CliArgs, Command, WriteArgs};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::fetcher::csrf::DEFAULT_CSRF_COOKIE;
use crate::fetcher::{ClientOptions, CrudClient, CrudError, CsrfSource};
use crate::form::Form;
use crate::output::{self, OutputFormat, PageReport};
use crate::pagination::{FileStore, PageSizeStore, PaginationTracker};
use crate::render::DateStyle;
use crate::schema::{default_registry, SchemaRegistry};
use crate::view::{NoticeKind, TableView};

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

#[derive(Clone, Debug)]
struct RunConfig {
    client: ClientOptions,
    config_path: Option<PathBuf>,
    storage_path: PathBuf,
    style: DateStyle,
    registry: SchemaRegistry,
    no_color: bool,
    verbose: u8,
    command: Command,
}

fn csrf_source(args: &CliArgs, cfg: &ConfigFile) -> Result<CsrfSource, String> {
    if let Some(token) = args.csrf_token.clone().or_else(|| cfg.csrf_token.clone()) {
        return Ok(CsrfSource::Token(token));
    }
    let page = cfg.csrf_page.clone().unwrap_or_default();
    let mode = cfg.csrf_mode.as_deref().unwrap_or("cookie");
    match mode.trim().to_lowercase().as_str() {
        "cookie" => Ok(CsrfSource::Cookie {
            name: args
                .csrf_cookie
                .clone()
                .or_else(|| cfg.csrf_cookie.clone())
                .unwrap_or_else(|| DEFAULT_CSRF_COOKIE.to_string()),
            header: None,
            page,
        }),
        "form" => Ok(CsrfSource::FormField { page }),
        "none" => Ok(CsrfSource::Disabled),
        other => Err(format!("invalid csrf_mode '{other}', expected cookie, form or none")),
    }
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    let base_url = args
        .base_url
        .clone()
        .or_else(|| cfg.base_url.clone())
        .unwrap_or_else(|| ClientOptions::default().base_url);
    let proxy = args
        .proxy
        .clone()
        .or_else(|| cfg.proxy.clone())
        .filter(|p| !p.trim().is_empty());
    let csrf = csrf_source(&args, &cfg)?;

    let storage_path = match args.storage_path.as_deref().or(cfg.storage_path.as_deref()) {
        Some(raw) => config::expand_tilde(raw),
        None => config::default_storage_path()
            .ok_or_else(|| "could not determine home directory for page size storage".to_string())?,
    };

    let mut style = DateStyle::default();
    if let Some(format) = cfg.date_format.clone() {
        style.date_format = format;
    }
    if let Some(format) = cfg.datetime_format.clone() {
        style.datetime_format = format;
    }
    if let Some(raw) = args.utc_offset.as_deref().or(cfg.utc_offset.as_deref()) {
        let offset = crate::utils::parse_utc_offset(raw)
            .map_err(|e| format!("invalid utc offset '{raw}': {e}"))?;
        style.offset = Some(offset);
    }

    let mut registry = default_registry();
    if let Some(schemas) = cfg.schemas.as_ref() {
        registry.extend_from_config(schemas);
    }

    Ok(RunConfig {
        client: ClientOptions {
            base_url,
            timeout_seconds: timeout,
            proxy,
            csrf,
        },
        config_path: args.config.as_deref().map(config::expand_tilde),
        storage_path,
        style,
        registry,
        no_color,
        verbose: args.verbose,
        command: args.command,
    })
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn,tablecrud=info",
        1 => "info,tablecrud=debug",
        _ => "debug,tablecrud=trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .try_init();
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed}]")
            .map_err(|e| format!("failed to build progress style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn print_notices(view: &mut TableView) {
    if let Some(notice) = view.take_notice() {
        let tag = match notice.kind {
            NoticeKind::Alert => "ALERT".bold().red(),
            NoticeKind::Banner => "WRN".bold().yellow(),
        };
        eprintln!("{}{}{} {}", "[".bold().white(), tag, "]".bold().white(), notice.message);
    }
}

fn print_ok(message: &str) {
    eprintln!("{}{}{} {}", "[".bold().white(), "OK".bold().green(), "]".bold().white(), message);
}

async fn write_or_print(path: Option<&str>, bytes: &[u8]) -> Result<(), String> {
    match path {
        Some(path) => {
            let path = config::expand_tilde(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("failed to create output directory '{}': {e}", parent.display()))?;
            }
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| format!("failed to write output '{}': {e}", path.display()))?;
            format_kv_line("Output", &path.display().to_string());
            Ok(())
        }
        None => {
            println!("{}", String::from_utf8_lossy(bytes).trim_end());
            Ok(())
        }
    }
}

fn describe(err: CrudError) -> String {
    match err.status() {
        Some(status) => format!("{} (HTTP {status})", err.user_message()),
        None => err.user_message(),
    }
}

/// Walks forward from the loaded page until the row with `id` is listed.
async fn locate_row(view: &mut TableView, client: &CrudClient, id: i64) -> Result<(), String> {
    loop {
        if view.rows().iter().any(|r| r.id() == Some(id)) {
            return Ok(());
        }
        let next = i64::from(view.pagination().state().page) + 1;
        if !view.change_page(client, next).await.map_err(describe)? {
            return Err(format!("no row with id {id} in {}", view.table()));
        }
    }
}

fn fill_form(form: &mut Form, write: &WriteArgs) -> Result<(), String> {
    for (field, raw) in crate::utils::parse_assignments(&write.set)? {
        form.set(&field, &raw).map_err(|e| format!("{field}: {}", e.user_message()))?;
    }
    for (field, path) in crate::utils::parse_assignments(&write.file)? {
        form.attach(&field, path);
    }
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    init_tracing(run.verbose);

    if let Command::InitConfig = run.command {
        let path = match run.config_path.clone() {
            Some(path) => path,
            None => config::default_config_path()
                .ok_or_else(|| "could not determine home directory for config".to_string())?,
        };
        let created = config::ensure_default_config_file(&path).map_err(|e| e.to_string())?;
        if created {
            print_ok(&format!("wrote {}", path.display()));
        } else {
            format_kv_line("Config", &format!("{} already exists", path.display()));
        }
        return Ok(());
    }

    let store: Arc<dyn PageSizeStore> = Arc::new(FileStore::new(run.storage_path.clone()));

    if let Command::PageSize(args) = &run.command {
        let mut tracker = PaginationTracker::new(&args.table, store).map_err(describe)?;
        let req = tracker.set_page_size_str(&args.size).map_err(describe)?;
        format_kv_line("Table", &args.table);
        format_kv_line("Page size", &req.page_size.to_string());
        return Ok(());
    }

    let client = CrudClient::new(run.client.clone()).map_err(|e| e.to_string())?;
    format_kv_line("Backend", client.base_url().as_str());
    let registry = Arc::new(run.registry.clone());

    let table = match &run.command {
        Command::List(a) => a.table.clone(),
        Command::Form(a) => a.table.clone(),
        Command::Create(a) => a.table.clone(),
        Command::Update(a) => a.write.table.clone(),
        Command::Delete(a) => a.table.clone(),
        Command::PageSize(_) | Command::InitConfig => return Ok(()),
    };
    let mut view = TableView::new(&table, registry, store, run.style.clone()).map_err(describe)?;

    let pb = spinner(&format!("loading {table}"))?;
    let loaded = view.select_table(&client, &table).await;
    pb.finish_and_clear();
    debug!(table = %table, ok = loaded.is_ok(), "initial load finished");

    let result = match &run.command {
        Command::List(args) => {
            loaded.map_err(describe)?;
            if let Some(raw) = args.page_size.as_deref() {
                let n = raw.trim().parse::<i64>().unwrap_or(0);
                view.change_page_size(&client, n).await.map_err(describe)?;
            }
            if let Some(page) = args.page.filter(|p| *p > 1) {
                if !view.change_page(&client, page).await.map_err(describe)? {
                    return Err(format!(
                        "page {page} out of range (1-{})",
                        view.pagination().state().total_pages
                    ));
                }
            }
            let format = args
                .output_format
                .as_deref()
                .and_then(OutputFormat::parse)
                .or_else(|| args.output.as_deref().and_then(output::infer_format_from_path))
                .unwrap_or(OutputFormat::Text);
            let state = *view.pagination().state();
            format_kv_line("Table", view.table());
            format_kv_line("Rows", &format!("{} of {}", view.rows().len(), state.total_items));
            let report = PageReport {
                table: view.table().to_string(),
                fields: view.fields(),
                data: view.rows().to_vec(),
                pagination: state,
                body: view.render(),
            };
            let bytes = output::render(format, view.schema(), &report, &run.style);
            write_or_print(args.output.as_deref(), &bytes).await
        }
        Command::Form(args) => {
            loaded.map_err(describe)?;
            if let Some(id) = args.id {
                locate_row(&mut view, &client, id).await?;
            }
            let html = view.open_form(&client, args.id).await.map_err(describe)?;
            write_or_print(args.output.as_deref(), html.as_bytes()).await
        }
        Command::Create(write) => {
            loaded.map_err(describe)?;
            let mut form = view.form(None);
            fill_form(&mut form, write)?;
            let pb = spinner("creating entry")?;
            let saved = view.submit(&client, &form).await;
            pb.finish_and_clear();
            let row = saved.map_err(describe)?;
            print_ok(&format!("created {} id {}", view.table(), row.id().unwrap_or_default()));
            write_or_print(None, &serde_json::to_vec_pretty(&row).unwrap_or_default()).await
        }
        Command::Update(args) => {
            loaded.map_err(describe)?;
            locate_row(&mut view, &client, args.id).await?;
            let mut form = view.form(Some(args.id));
            fill_form(&mut form, &args.write)?;
            let pb = spinner("updating entry")?;
            let saved = view.submit(&client, &form).await;
            pb.finish_and_clear();
            let row = saved.map_err(describe)?;
            print_ok(&format!("updated {} id {}", view.table(), args.id));
            write_or_print(None, &serde_json::to_vec_pretty(&row).unwrap_or_default()).await
        }
        Command::Delete(args) => {
            let pb = spinner("deleting entry")?;
            let deleted = view.delete(&client, args.id).await;
            pb.finish_and_clear();
            deleted.map_err(describe)?;
            print_ok(&format!("deleted {} id {}", view.table(), args.id));
            Ok(())
        }
        Command::PageSize(_) | Command::InitConfig => Ok(()),
    };
    print_notices(&mut view);
    result
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.as_deref().map(config::expand_tilde) {
        Some(path) => config::load_config(&path, matches!(args.command, Command::InitConfig))
            .map_err(|e| e.to_string())?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true).map_err(|e| e.to_string())?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
