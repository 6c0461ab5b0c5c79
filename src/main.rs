use colored::Colorize;

fn main() {
    if let Err(e) = tablecrud::app::run_cli() {
        eprintln!(
            "{}{}{} {}",
            "[".bold().white(),
            "ERR".bold().red(),
            "]".bold().white(),
            e
        );
        std::process::exit(1);
    }
}
