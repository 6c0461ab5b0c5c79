use crate::cli::args::{CliArgs, Command, WriteArgs};

fn validate_write(write: &WriteArgs) -> Result<(), String> {
    crate::utils::validate_table_name(&write.table)?;
    crate::utils::parse_assignments(&write.set)?;
    crate::utils::parse_assignments(&write.file)?;
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.utc_offset.as_deref() {
        crate::utils::parse_utc_offset(raw).map_err(|e| format!("invalid --utc-offset '{raw}': {e}"))?;
    }
    match &args.command {
        Command::List(list) => {
            crate::utils::validate_table_name(&list.table)?;
            if let Some(page) = list.page {
                if page < 1 {
                    return Err("invalid page, expected positive integer".to_string());
                }
            }
            if let Some(raw) = list.output_format.as_deref() {
                crate::output::OutputFormat::parse(raw)
                    .ok_or_else(|| format!("invalid --output-format '{raw}', expected html, json or text"))?;
            }
        }
        Command::Form(form) => crate::utils::validate_table_name(&form.table)?,
        Command::Create(write) => validate_write(write)?,
        Command::Update(update) => validate_write(&update.write)?,
        Command::Delete(delete) => crate::utils::validate_table_name(&delete.table)?,
        Command::PageSize(page_size) => crate::utils::validate_table_name(&page_size.table)?,
        Command::InitConfig => {}
    }
    Ok(())
}
