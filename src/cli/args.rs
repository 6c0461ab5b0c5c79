use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tablecrud",
    version,
    about = "table CRUD client for JSON REST backends",
    long_about = "tablecrud lists, creates, updates and deletes rows of the per-table JSON endpoints exposed by a CRUD backend, and renders them as HTML.\n\nExamples:\n  tablecrud list table1\n  tablecrud list table2 --page 2 -o table2.html\n  tablecrud create table1 -s char_field=hello -s many_to_many=2,5 -f image_field=./photo.png\n  tablecrud delete table3 7\n\nTip: Use `tablecrud init-config` to write ~/.tablecrud/config.yml and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.tablecrud/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "bu",
        visible_alias = "base-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Base URL of the table endpoints (e.g. http://127.0.0.1:8000/json_app/)."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "ct",
        visible_alias = "csrf-token",
        value_name = "TOKEN",
        global = true,
        help_heading = "HTTP",
        help = "Send this CSRF token instead of reading it from a cookie."
    )]
    pub csrf_token: Option<String>,

    #[arg(
        long = "cc",
        visible_alias = "csrf-cookie",
        value_name = "NAME",
        global = true,
        help_heading = "HTTP",
        help = "Cookie holding the CSRF token (default csrftoken)."
    )]
    pub csrf_cookie: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "sp",
        visible_alias = "storage-path",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "File remembering the page size chosen per table."
    )]
    pub storage_path: Option<String>,

    #[arg(
        long = "uo",
        visible_alias = "utc-offset",
        value_name = "OFFSET",
        global = true,
        help_heading = "Output",
        help = "Show datetimes at this offset (+HH:MM, -HH:MM or UTC) instead of local time."
    )]
    pub utc_offset: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch one page of a table and render it.
    List(ListArgs),
    /// Render the create form, or the edit form for --id.
    Form(FormArgs),
    /// Create a row.
    Create(WriteArgs),
    /// Update a row.
    Update(UpdateArgs),
    /// Delete a row.
    Delete(DeleteArgs),
    /// Remember the page size for a table.
    PageSize(PageSizeArgs),
    /// Write the default config file if it does not exist.
    InitConfig,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(long = "pg", visible_alias = "page", value_name = "N", help = "Page to fetch (default 1).")]
    pub page: Option<i64>,

    #[arg(
        long = "ps",
        visible_alias = "page-size",
        value_name = "N",
        help = "Page size for this and later listings of the table."
    )]
    pub page_size: Option<String>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help = "Write the rendered page to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help = "Output format: html, json or text (inferred from --output, else text)."
    )]
    pub output_format: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FormArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(long = "id", value_name = "ID", help = "Pre-fill the form from this row.")]
    pub id: Option<i64>,

    #[arg(short = 'o', long = "out", visible_alias = "output", value_name = "FILE")]
    pub output: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(
        short = 's',
        long = "set",
        value_name = "FIELD=VALUE",
        action = ArgAction::Append,
        help = "Field value (repeatable). Multi-relations take comma-separated ids."
    )]
    pub set: Vec<String>,

    #[arg(
        short = 'f',
        long = "file",
        value_name = "FIELD=PATH",
        action = ArgAction::Append,
        help = "Attach a file to a file or image field (repeatable)."
    )]
    pub file: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub write: WriteArgs,

    #[arg(long = "id", value_name = "ID")]
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(value_name = "ID")]
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct PageSizeArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(value_name = "SIZE")]
    pub size: String,
}
