use super::{colorize_report, exit_code, finish, json_pretty, open_sink, RunOptions};
use chrono::Local;
use mirrorcheck_core::{load_cases, run_suite};
use std::path::PathBuf;

pub fn run(opts: &RunOptions, case_files: &[PathBuf], skip_download: bool) -> Result<u8, String> {
    let config = opts.load_suite_config()?;
    let cases = load_cases(case_files).map_err(|e| e.to_string())?;
    if cases.is_empty() {
        tracing::warn!("no runnable cases in {} file(s)", case_files.len());
    }

    let sink = open_sink(&config.download_directory_path)?;
    let pb = opts.spinner(&format!(
        "running {} cases against {}",
        cases.len(),
        config.cloud_webservice_api_url
    ));
    let report = match run_suite(&config, &cases, skip_download, &sink) {
        Ok(report) => report,
        Err(e) => {
            finish(pb.as_ref(), false, "suite aborted");
            return Err(format!(
                "failed to prepare {}: {e}",
                config.download_directory_path.display()
            ));
        }
    };
    finish(
        pb.as_ref(),
        report.is_success(),
        &format!("{} of {} cases passed", report.passed(), report.results.len()),
    );

    if opts.json {
        println!("{}", json_pretty(&report)?);
    } else {
        print!("{}", colorize_report(&report.render()));
    }
    opts.send(
        config.email.as_ref(),
        &report.email(&Local::now()),
        !report.is_success(),
    );
    Ok(exit_code(report.is_success()))
}
