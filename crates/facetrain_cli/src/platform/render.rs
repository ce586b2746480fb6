use std::fmt::Write;

use facetrain_core::{
    group_by, DeployReport, FolderSummary, JobHistory, JobPhase, MergeCandidate, PageViewModel,
    ProgressFolder, QueueItem, QueueStatus, Readiness, SmartQueueEntry, SmartRun, StatusResponse,
    StoredVideo, TARGET_TRAINING_IMAGES,
};
use facetrain_engine::{
    format_duration, format_size_mb, AllBatches, BenchmarkResult, CandidateBatch, Celebrity, Choice,
    ComparisonResult, HealthReport, JobSnapshot, MergeScan, MetricsSummary, PipelineResult,
    StorageStats, VideoApiInfo,
};

pub(crate) fn queue(view: &PageViewModel<QueueItem>, status: Option<&QueueStatus>) -> String {
    let mut out = String::new();
    if let Some(status) = status {
        let _ = writeln!(
            out,
            "Queue: {} pending, {} processing, {} completed, {} failed",
            status.pending, status.processing, status.completed, status.failed
        );
    }
    let items: Vec<&QueueItem> = view.rows.iter().map(|row| &row.item).collect();
    for (occupation, members) in group_by(items.iter().copied(), |item| {
        item.occupation_or_unknown().to_string()
    }) {
        let _ = writeln!(out, "{occupation} ({})", members.len());
        for item in members {
            let photos = item
                .valid_photos
                .map(|count| format!(" [{count} photos]"))
                .unwrap_or_default();
            let _ = writeln!(out, "  #{:<6} {}{photos}", item.id, item.full_name());
        }
    }
    out.push_str(&footer(view));
    out
}

pub(crate) fn progress(view: &PageViewModel<ProgressFolder>) -> String {
    let mut out = String::new();
    for row in &view.rows {
        let folder = &row.item;
        let _ = writeln!(
            out,
            "{:<32} {:>4}/{TARGET_TRAINING_IMAGES}  {}",
            folder.name,
            folder.image_count,
            readiness_label(folder.readiness())
        );
    }
    out.push_str(&footer(view));
    out
}

fn readiness_label(readiness: Readiness) -> &'static str {
    match readiness {
        Readiness::Empty => "empty",
        Readiness::Insufficient => "insufficient",
        Readiness::Adequate => "adequate",
        Readiness::Ready => "ready",
    }
}

pub(crate) fn staging(view: &PageViewModel<FolderSummary>) -> String {
    let mut out = String::new();
    for row in &view.rows {
        let folder = &row.item;
        let marker = if folder.ready_for_production { "ready" } else { "" };
        let _ = writeln!(
            out,
            "{:<32} {:>4} images  {marker}",
            folder.folder_name, folder.image_count
        );
    }
    out.push_str(&footer(view));
    out
}

pub(crate) fn candidates(batch: &CandidateBatch, selected: usize) -> String {
    let mut out = String::new();
    for candidate in &batch.candidates {
        let state = if candidate.exists_in_db {
            format!("in database, {} photos", candidate.existing_photo_count)
        } else {
            "new".to_string()
        };
        let _ = writeln!(out, "{:<32} {:<10} {state}", candidate.full_name, candidate.wikidata_id);
    }
    let stats = &batch.statistics;
    let _ = writeln!(
        out,
        "{} candidates: {} new, {} existing; {selected} selected",
        stats.total, stats.new, stats.existing
    );
    out
}

pub(crate) fn choices(title: &str, choices: &[Choice]) -> String {
    let mut out = format!("{title}:\n");
    for choice in choices {
        let _ = writeln!(out, "  {:<24} {}", choice.id, choice.name);
    }
    out
}

pub(crate) fn batches(all: &AllBatches) -> String {
    let mut out = String::new();
    for (title, list) in [("Running", &all.running), ("Finished", &all.completed)] {
        let _ = writeln!(out, "{title} ({})", list.len());
        for batch in list {
            let source = match batch.source {
                Some(facetrain_core::BatchSource::Serp) => "serp",
                Some(facetrain_core::BatchSource::Wikidata) => "wikidata",
                None => "-",
            };
            let _ = writeln!(
                out,
                "  {:<24} {:<9} {:<10} {}/{} done, {} failed  {}",
                batch.batch_id,
                source,
                batch.status,
                batch.completed,
                batch.total,
                batch.failed,
                batch.sort_key()
            );
        }
    }
    out
}

/// One line describing where a tracked job stands.
pub(crate) fn job_line(label: &str, snapshot: &JobSnapshot) -> String {
    let id = snapshot.job_id.as_deref().unwrap_or("-");
    let Some(status) = &snapshot.status else {
        return match &snapshot.error {
            Some(error) => format!("{label} {id}: {error}"),
            None => format!("{label} {id}: waiting for first status"),
        };
    };
    let response = &status.response;
    let mut line = format!("{label} {id}: {}", phase_label(status.phase()));
    let counter = |key: &str| response.field(key).and_then(|value| value.as_u64());
    if let (Some(done), Some(total)) = (counter("completed"), counter("total")) {
        let _ = write!(line, " ({done}/{total})");
    } else if let Some(progress) = response.field("progress").and_then(|value| value.as_f64()) {
        let _ = write!(line, " ({progress:.0}%)");
    }
    match (&snapshot.error, &response.message) {
        (Some(error), _) => {
            let _ = write!(line, ": {error}");
        }
        (None, Some(message)) if !message.is_empty() => {
            let _ = write!(line, ": {message}");
        }
        _ => {}
    }
    line
}

/// Result of an upload that waited for recognition in the same request.
pub(crate) fn sync_result(response: &StatusResponse) -> String {
    let id = response
        .field("video_id")
        .and_then(|value| value.as_str())
        .unwrap_or("-");
    let mut out = format!("video {id}: {}", phase_label(response.phase()));
    let message = response.message.as_deref().unwrap_or_default();
    if !message.is_empty() {
        let _ = write!(out, ": {message}");
    }
    if let Some(statistics) = response.field("statistics") {
        let _ = write!(out, "\nstatistics: {statistics}");
    }
    out.push('\n');
    out
}

fn phase_label(phase: JobPhase) -> &'static str {
    match phase {
        JobPhase::Processing => "processing",
        JobPhase::Completed => "completed",
        JobPhase::Failed => "failed",
        JobPhase::NotFound => "not found",
    }
}

pub(crate) fn deploy(report: &DeployReport) -> String {
    let mut out = String::new();
    for folder in &report.deployed {
        let _ = writeln!(out, "deployed {} ({} images)", folder.folder, folder.image_count);
    }
    for folder in &report.skipped {
        let _ = writeln!(out, "skipped {}: {}", folder.folder, folder.reason);
    }
    for error in &report.errors {
        let _ = writeln!(out, "error: {error}");
    }
    if out.is_empty() {
        out.push_str("nothing deployed\n");
    }
    out
}

pub(crate) fn storage(stats: &StorageStats) -> String {
    let usage = &stats.disk_usage;
    let mut out = format!(
        "{} videos, {}\nvideos {}, frames {}, results {}, total {}\n",
        stats.total_videos,
        format_size_mb(stats.total_size_mb),
        format_size_mb(usage.videos_mb),
        format_size_mb(usage.frames_mb),
        format_size_mb(usage.results_mb),
        format_size_mb(usage.total_mb),
    );
    if stats.is_critical() {
        out.push_str("CRITICAL: disk usage above 5 GB, clean up old videos\n");
    } else if stats.is_warning() {
        out.push_str("warning: disk usage above 2 GB\n");
    }
    out
}

pub(crate) fn videos(videos: &[StoredVideo]) -> String {
    if videos.is_empty() {
        return "no stored videos\n".to_string();
    }
    let mut out = String::new();
    for video in videos {
        let _ = writeln!(
            out,
            "{:<38} {:<24} {:>10} {:>8}  {}{}",
            video.video_id,
            video.filename.as_deref().unwrap_or("-"),
            format_size_mb(video.size_mb),
            format_duration(video.duration_seconds),
            video.uploaded_at.as_deref().unwrap_or("-"),
            if video.results_available { "  results" } else { "" },
        );
    }
    out
}

pub(crate) fn limits(info: &VideoApiInfo) -> String {
    let seconds = |value: Option<f64>| {
        value
            .map(|value| format!("{value} s"))
            .unwrap_or_else(|| "-".to_string())
    };
    let mut out = format!("formats: {}\n", info.supported_formats.join(", "));
    if let Some(max) = info.max_file_size_mb {
        let _ = writeln!(out, "max size: {}", format_size_mb(max));
    }
    let _ = writeln!(
        out,
        "interval: {} to {}, default {}",
        seconds(info.min_interval_seconds),
        seconds(info.max_interval_seconds),
        seconds(info.default_interval_seconds)
    );
    out
}

pub(crate) fn history(history: &JobHistory) -> String {
    let mut out = String::new();
    for (title, jobs) in [("Processing", &history.processing), ("Completed", &history.completed)] {
        let _ = writeln!(out, "{title} ({})", jobs.len());
        for entry in jobs.entries() {
            let _ = writeln!(
                out,
                "  {:<38} {:<12} {}",
                entry.job_id,
                entry.domain.as_deref().unwrap_or("-"),
                entry.recorded_at
            );
        }
    }
    out
}

pub(crate) fn comparison(result: &ComparisonResult) -> String {
    let mut out = String::new();
    if let Some(image_id) = &result.image_id {
        let _ = writeln!(out, "image {image_id}");
    }
    if let Some(truth) = &result.ground_truth {
        let _ = writeln!(out, "ground truth: {truth}");
    }
    let _ = writeln!(out, "{}", pipeline_line("A", &result.pipeline_a_result));
    let _ = writeln!(out, "{}", pipeline_line("B", &result.pipeline_b_result));

    let metrics = &result.comparison.comparison_metrics;
    out.push_str(if metrics.results_match {
        "pipelines agree"
    } else {
        "pipelines disagree"
    });
    let winner = metrics
        .accuracy
        .as_ref()
        .and_then(|accuracy| accuracy.winner.as_deref());
    if let Some(winner) = winner {
        let _ = write!(out, ", more accurate: {winner}");
    }
    if let Some(faster) = &metrics.faster_pipeline {
        let _ = write!(out, ", faster: {faster}");
    }
    out.push('\n');
    if let Some(recommendation) = &result.recommendation {
        let _ = writeln!(out, "{recommendation}");
    }
    out
}

fn pipeline_line(label: &str, result: &PipelineResult) -> String {
    let profile = result
        .profile_used
        .as_ref()
        .map(|profile| format!(" ({}, {})", profile.name, profile.model))
        .unwrap_or_default();
    let confidence = result
        .confidence
        .map(|confidence| format!(" {confidence:.1}%"))
        .unwrap_or_default();
    let time = result
        .processing_time
        .map(|seconds| format!(" in {seconds:.2}s"))
        .unwrap_or_default();
    format!(
        "pipeline {label}{profile}: {}, {}{confidence}{time}",
        result.status,
        result.person.as_deref().unwrap_or("no match")
    )
}

pub(crate) fn metrics(title: &str, summary: &MetricsSummary) -> String {
    let mut out = String::new();
    let range = &summary.date_range;
    let _ = writeln!(
        out,
        "{title} {}..{}: {} comparisons",
        range.start, range.end, summary.total_comparisons
    );
    let agreement = &summary.agreement;
    let _ = writeln!(
        out,
        "agreement {:.1}% ({} agree, {} disagree)",
        agreement.agreement_rate, agreement.total_agreements, agreement.total_disagreements
    );
    let accuracy = &summary.accuracy;
    if let (Some(a), Some(b)) = (accuracy.pipeline_a_accuracy, accuracy.pipeline_b_accuracy) {
        let _ = write!(out, "accuracy A {a:.1}%, B {b:.1}%");
        if let Some(improvement) = accuracy.improvement {
            let _ = write!(out, " ({improvement:+.1})");
        }
        let _ = writeln!(out, " over {} labelled images", accuracy.total_with_ground_truth);
    }
    for (status, share) in &summary.status_breakdown {
        let _ = writeln!(out, "  {status:<18} {:>6} ({:.1}%)", share.count, share.percentage);
    }
    out
}

pub(crate) fn health(report: &HealthReport) -> String {
    let mut out = format!("status: {}\n", report.status);
    for (pipeline, state) in &report.pipelines {
        let _ = writeln!(out, "  {pipeline}: {state}");
    }
    out
}

pub(crate) fn smart_queue(view: &PageViewModel<SmartQueueEntry>) -> String {
    let mut out = String::new();
    for row in &view.rows {
        let entry = &row.item;
        let score = entry
            .recognition_score
            .map(|score| format!(" [{score:.0}%]"))
            .unwrap_or_default();
        let occupation = entry
            .occupation
            .as_deref()
            .map(|occupation| format!(" ({occupation})"))
            .unwrap_or_default();
        let _ = writeln!(out, "{:<6} {}{occupation}{score}", entry.priority, entry.person_name);
    }
    out.push_str(&footer(view));
    out
}

pub(crate) fn smart_runs(runs: &[SmartRun]) -> String {
    if runs.is_empty() {
        return "no smart training runs\n".to_string();
    }
    let mut out = String::new();
    for run in runs {
        let mut parts = vec![format!("#{} {}", run.run_id, run.status)];
        if let Some(started) = &run.started_at {
            parts.push(format!("started {started}"));
        }
        if let Some(discovery) = &run.discovery {
            parts.push(format!("{} discovered", discovery.discovered));
        }
        if let Some(benchmark) = &run.benchmark {
            parts.push(format!("{} tested", benchmark.benchmarked));
        }
        if let Some(training) = &run.training {
            parts.push(format!("{}/{} trained", training.successful, training.attempted));
        }
        out.push_str(&parts.join(", "));
        if let Some(error) = &run.error {
            let _ = write!(out, ": {error}");
        }
        out.push('\n');
    }
    out
}

pub(crate) fn benchmark(result: &BenchmarkResult) -> String {
    let score = result
        .recognition_score
        .map(|score| format!("{score:.1}%"))
        .unwrap_or_else(|| "no score".to_string());
    match &result.training_priority {
        Some(priority) => format!(
            "{}: {score}, training priority {priority}\n",
            result.person_name
        ),
        None => format!("{}: {score}\n", result.person_name),
    }
}

pub(crate) fn benchmark_candidates(entries: &[SmartQueueEntry]) -> String {
    if entries.is_empty() {
        return "every benchmarked person scores above the threshold\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let score = entry
            .recognition_score
            .map(|score| format!("{score:.1}%"))
            .unwrap_or_default();
        let _ = writeln!(out, "{:<32} {score}", entry.person_name);
    }
    out
}

pub(crate) fn celebrities(found: &[Celebrity]) -> String {
    let mut out = String::new();
    for celebrity in found {
        let _ = writeln!(
            out,
            "{:<32} {:<24} {}",
            celebrity.name,
            celebrity.occupation.as_deref().unwrap_or_default(),
            celebrity.wikidata_id.as_deref().unwrap_or_default()
        );
    }
    let _ = writeln!(out, "{} found", found.len());
    out
}

pub(crate) fn merge_scan(scan: &MergeScan) -> String {
    let summary = &scan.summary;
    let mut out = format!(
        "{} candidates among {} persons: {} typos, {} duplicates, {} spelling variants, {} nicknames\n",
        scan.total_candidates,
        scan.total_persons,
        summary.typos,
        summary.duplicates,
        summary.spelling_variants,
        summary.nicknames
    );
    if let Some(scanned_at) = &scan.scanned_at {
        let _ = writeln!(out, "last scan {scanned_at}");
    }
    out
}

pub(crate) fn merge_candidates(view: &PageViewModel<MergeCandidate>) -> String {
    let mut out = String::new();
    for row in &view.rows {
        let candidate = &row.item;
        let target = match &candidate.target_name {
            Some(target) => format!("{target} ({})", candidate.target_embeddings),
            None => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "[{}] {:<16} {} ({}) -> {target}: {}",
            candidate.index(),
            candidate.kind,
            candidate.source_name,
            candidate.source_embeddings,
            candidate.reason
        );
    }
    out.push_str(&footer(view));
    out
}

fn footer<T>(view: &PageViewModel<T>) -> String {
    let mut out = String::new();
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
    }
    if !view.loaded {
        out.push_str("loading...\n");
        return out;
    }
    let _ = write!(out, "page {}/{}", view.page, view.total_pages);
    if view.matching_items != view.total_items {
        let _ = write!(out, ", {} of {} match", view.matching_items, view.total_items);
    } else {
        let _ = write!(out, ", {} total", view.total_items);
    }
    if let Some(scope) = &view.scope {
        let _ = write!(out, " [{scope}]");
    }
    out.push('\n');
    out
}
