use super::runner::{JobContext, blocking};
use crate::schema::{JobError, JobStatus, RoastParameters, RoastedFile};
use crate::services::classifier::Extensions;
use crate::services::selector::select_for_critique;

/// Picks representative files and has the remote critic roast each one.
pub async fn auto_roast(ctx: &JobContext, job_id: &str, params: &RoastParameters) -> Result<(), JobError> {
    let critic = ctx.critic()?;
    let job = ctx.store.get(job_id)?;
    let root = job.snapshot()?.to_path_buf();

    ctx.store.update(job_id, &mut |job| {
        job.transition(
            JobStatus::Analyzing,
            format!("Selecting files for {} critique...", params.style),
        )
    })?;

    let filter = Extensions::or_code_default(params.extensions.as_deref());
    let directories = params.directories.clone();
    let desired = params.file_count;
    let selected =
        blocking(move || select_for_critique(&root, &filter, directories.as_deref(), desired)).await?;
    tracing::info!(job_id = %job_id, selected = selected.len(), style = %params.style, "files selected for critique");

    let total = selected.len();
    let mut roasted = Vec::with_capacity(total);
    for (index, candidate) in selected.into_iter().enumerate() {
        ctx.store.update(job_id, &mut |job| {
            job.set_message(format!("Critiquing {} ({}/{total})...", candidate.path, index + 1));
            Ok(())
        })?;

        let critique = critic
            .critique(
                &candidate.content,
                &candidate.path,
                params.style,
                params.description.as_deref(),
            )
            .await;
        let suggestions = if params.suggestions.is_enabled() {
            Some(
                critic
                    .suggestions(&candidate.content, &candidate.path, params.suggestions)
                    .await,
            )
            .filter(|text| !text.is_empty())
        } else {
            None
        };

        roasted.push(RoastedFile {
            path: candidate.path,
            critique,
            suggestions,
        });
    }

    let summary = if roasted.len() > 1 {
        let pairs: Vec<(String, String)> = roasted
            .iter()
            .map(|file| (file.path.clone(), file.critique.clone()))
            .collect();
        Some(critic.summarize(&pairs).await)
    } else {
        None
    };

    let message = format!(
        "Critique completed for {} files in {} style",
        roasted.len(),
        params.style
    );
    ctx.store.update(job_id, &mut |job| {
        job.roasted_files = Some(roasted.clone());
        job.summary = summary.clone();
        job.parameters = Some(params.clone());
        job.transition(JobStatus::Completed, message.clone())
    })?;
    Ok(())
}
