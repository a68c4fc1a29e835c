//! Web root marker files.

use std::fs;

use crate::command_runner::{CommandRunner, run_command};
use crate::commands::system::ChangeLabelType;
use crate::config::{HostPaths, ProvisionConfig};
use crate::error::Result;
use crate::report::StepOutcome;

/// Step 6: create the marker files and mislabel one of them.
///
/// Existing markers are truncated to empty. A failed label change is logged
/// and does not fail the step.
pub fn provision_content(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
) -> Result<StepOutcome> {
    let web_root = paths.resolve(&config.paths.web_root);
    fs::create_dir_all(&web_root)?;

    for name in &config.marker_files {
        fs::File::create(web_root.join(name))?;
    }

    let labelled = web_root.join(&config.labelled_marker);
    let label_applied = match run_command(
        runner,
        &ChangeLabelType {
            label_type: config.wrong_label_type.clone(),
            path: labelled.clone(),
        },
    ) {
        Ok(output) if output.success => true,
        Ok(output) => {
            tracing::warn!(
                "chcon on {} failed: {}",
                labelled.display(),
                output.stderr.trim()
            );
            false
        }
        Err(e) => {
            tracing::warn!("chcon on {} failed: {}", labelled.display(), e);
            false
        }
    };

    let detail = format!(
        "{} marker file(s) in {}",
        config.marker_files.len(),
        web_root.display()
    );
    Ok(StepOutcome::success(if label_applied {
        format!("{}, {} labelled {}", detail, config.labelled_marker, config.wrong_label_type)
    } else {
        format!("{}, label not applied", detail)
    }))
}
