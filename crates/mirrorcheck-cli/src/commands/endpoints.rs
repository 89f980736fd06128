use super::{colorize_report, exit_code, finish, json_pretty, open_sink, RunOptions};
use chrono::Local;
use mirrorcheck_core::{run_endpoints, ApiRunReport, SyncConfig, SyncTarget};

pub fn execute(
    opts: &RunOptions,
    config: &SyncConfig,
    target: &SyncTarget,
) -> Result<ApiRunReport, String> {
    let sink = open_sink(&config.log_path)?;
    let pb = opts.spinner(&format!(
        "polling {} endpoints on {}",
        config.api_endpoints.len(),
        target.cloud_ip
    ));
    let report = match run_endpoints(config, target, &sink) {
        Ok(report) => report,
        Err(e) => {
            finish(pb.as_ref(), false, "endpoint run aborted");
            return Err(format!(
                "failed to prepare {}: {e}",
                config.log_path.display()
            ));
        }
    };
    finish(
        pb.as_ref(),
        report.is_success(),
        &format!(
            "{} of {} endpoints passed",
            report.passed(),
            report.results.len()
        ),
    );
    Ok(report)
}

pub fn run(opts: &RunOptions, cloud_ip: &str, ancor_ip: &str) -> Result<u8, String> {
    let config = opts.load_sync_config()?;
    let target = SyncTarget::new(cloud_ip, ancor_ip);
    let report = execute(opts, &config, &target)?;

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
