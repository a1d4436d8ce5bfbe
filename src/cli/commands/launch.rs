//! Launch command - run the entry point of a packaged archive

use crate::cli::args::LaunchArgs;
use crate::config::Config;
use crate::error::OsrcResult;
use crate::launch::Launcher;
use tracing::debug;

/// Execute the launch command, returning the application's exit code
pub async fn execute(args: LaunchArgs, config: &Config) -> OsrcResult<i32> {
    let java = args.java.unwrap_or_else(|| config.launcher.java.clone());
    let launcher = Launcher::new(&args.archive, java, config.launcher.extract_dir());
    let plan = launcher.prepare(&args.args)?;
    debug!(
        "Resolved {} with {} classpath entries",
        plan.selection.main_class,
        plan.classpath.len()
    );

    if args.dry_run {
        println!("{}", plan.command_line().join(" "));
        return Ok(0);
    }
    launcher.run(&plan).await
}
