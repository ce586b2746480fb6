use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use facetrain_core::{
    update, ActionOutcome, CandidateItem, FolderSummary, HistoryEntry, JobHistory, JobPhase,
    ListItem, MergeCandidate, OptimisticChange, PageMsg, PageState, Priority, ProgressFolder,
    QueueItem, SmartQueueEntry, UpdateMode,
};
use facetrain_engine::{
    AbTestingService, ApiError, AuthService, AutomatedTrainingService, ComparisonUpload,
    FailureKind, JobSnapshot, JobTracker, ListController, LoginOutcome, MergeAction,
    MergeCandidatesService, MetricsSummary, Poller, SmartCycleConfig, SmartTrainingService,
    StorageService, TrainingService, Transport, UploadFile, VideoService, VideoUpload,
};
use facetrain_logging::{ft_debug, ft_error, ft_info, ft_warn};

use super::cli::{
    AbCommand, BatchCommand, Command, ListArgs, MergeActionArg, MergeCommand, QueueCommand,
    SmartCommand, StagingCommand, StorageCommand,
};
use super::config::ClientConfig;
use super::persistence::{Session, Store};
use super::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueAction {
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagingAction {
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmartAction {
    Remove,
    Promote,
}

/// Runs one command against the backend chosen at startup.
pub(crate) struct App {
    config: ClientConfig,
    store: Store,
    transport: Arc<dyn Transport>,
}

impl App {
    pub(crate) fn new(config: ClientConfig, store: Store, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            store,
            transport,
        }
    }

    pub(crate) async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, select } => self.login(&email, select.as_deref()).await,
            Command::Logout => {
                self.store.clear_session()?;
                println!("logged out");
                Ok(())
            }
            Command::Queue { action } => {
                match action.unwrap_or(QueueCommand::List(ListArgs::default())) {
                    QueueCommand::List(args) => self.queue_list(&args).await,
                    QueueCommand::Watch { updates } => self.queue_watch(updates).await,
                    QueueCommand::Remove { id } => self.queue_remove(id).await,
                }
            }
            Command::Progress(args) => self.progress(&args).await,
            Command::GenerateNames {
                country,
                occupations,
            } => {
                let response = self
                    .training()
                    .generate_names(&country, &occupations)
                    .await?;
                println!("{}", response.message.as_deref().unwrap_or("names generated"));
                Ok(())
            }
            Command::ProcessNext => {
                let result = self.training().process_next().await?;
                println!("{}", result.message.as_deref().unwrap_or("processed"));
                if !result.data.is_null() {
                    println!("{:#}", result.data);
                }
                Ok(())
            }
            Command::SyncFaces => {
                let response = self.training().sync_faces().await?;
                println!("{}", response.message.as_deref().unwrap_or("sync started"));
                Ok(())
            }
            Command::Choices => self.choices().await,
            Command::Candidates {
                country,
                occupation,
                start,
                watch,
            } => self.candidates(&country, &occupation, start, watch).await,
            Command::Batch { action } => match action {
                BatchCommand::Watch { batch_id } => self.watch_batch(batch_id).await,
                BatchCommand::Cancel { batch_id } => self.cancel_batch(batch_id).await,
            },
            Command::Batches => {
                let all = self.automated().list_all_batches().await?;
                print!("{}", render::batches(&all));
                Ok(())
            }
            Command::Staging { action } => match action {
                StagingCommand::List(args) => self.staging_list(&args).await,
                StagingCommand::Deploy { folders } => self.staging_deploy(folders).await,
                StagingCommand::Remove { folders } => self.staging_remove(folders).await,
            },
            Command::Upload {
                path,
                interval,
                sync,
                watch,
            } => self.upload(&path, interval, sync, watch).await,
            Command::Video { video_id } => {
                let mut history = self.store.load_history();
                self.watch_video(video_id, &mut history).await
            }
            Command::Limits => {
                print!("{}", render::limits(&self.video().info().await?));
                Ok(())
            }
            Command::Recent {
                recheck,
                clear_completed,
            } => self.recent(recheck, clear_completed).await,
            Command::Storage { action } => self.storage(action).await,
            Command::Ab { action } => self.ab(action).await,
            Command::Smart { action } => self.smart(action).await,
            Command::Merge { action } => self.merge(action).await,
        }
    }

    fn domain(&self) -> String {
        self.config.default_domain.clone()
    }

    fn training(&self) -> TrainingService {
        TrainingService::new(self.transport.clone())
    }

    fn automated(&self) -> AutomatedTrainingService {
        AutomatedTrainingService::new(self.transport.clone())
    }

    fn video(&self) -> VideoService {
        VideoService::new(self.transport.clone())
    }

    fn smart_training(&self) -> SmartTrainingService {
        SmartTrainingService::new(self.transport.clone())
    }

    fn merge_candidates(&self) -> MergeCandidatesService {
        MergeCandidatesService::new(self.transport.clone())
    }

    async fn login(&self, email: &str, select: Option<&str>) -> Result<()> {
        let token = match AuthService::new(self.transport.clone()).login(email).await? {
            LoginOutcome::Single(token) => token,
            LoginOutcome::MultiDomain(tokens) => match select {
                Some(domain) => tokens
                    .into_iter()
                    .find(|token| token.domain.as_deref() == Some(domain))
                    .ok_or_else(|| anyhow!("account has no access to domain {domain:?}"))?,
                None => {
                    let domains: Vec<&str> = tokens
                        .iter()
                        .filter_map(|token| token.domain.as_deref())
                        .collect();
                    bail!(
                        "account spans several domains ({}); pass --select <domain>",
                        domains.join(", ")
                    );
                }
            },
        };

        let session = Session {
            email: if token.email.is_empty() {
                email.to_string()
            } else {
                token.email
            },
            token: token.token,
            domain: token.domain,
        };
        self.store.save_session(&session)?;
        ft_info!("logged in as {}", session.email);
        match &session.domain {
            Some(domain) => println!("logged in as {} ({domain})", session.email),
            None => println!("logged in as {}", session.email),
        }
        Ok(())
    }

    fn queue_controller(&self, polling: bool) -> ListController<QueueItem, QueueAction> {
        let training = self.training();
        let remover = training.clone();
        ListController::new(
            None,
            self.config.poll_interval(),
            polling,
            move |_scope| {
                let training = training.clone();
                async move { training.queue_list().await }
            },
            move |id: String, _action: QueueAction| {
                let remover = remover.clone();
                async move {
                    let removed = remover.remove_from_queue(&id).await?;
                    ft_info!(
                        "removed {id} from queue; {} remaining",
                        removed.remaining_count.unwrap_or_default()
                    );
                    Ok::<(), ApiError>(())
                }
            },
        )
    }

    async fn queue_list(&self, args: &ListArgs) -> Result<()> {
        let mut controller = self.queue_controller(false).with_page_size(args.page_size);
        controller.refresh().await;
        ensure_loaded(controller.state())?;
        apply_list_args(&mut controller, args).await;

        let status = match self.training().queue_status().await {
            Ok(status) => Some(status),
            Err(err) => {
                ft_warn!("queue status unavailable: {err}");
                None
            }
        };
        print!("{}", render::queue(&controller.view(), status.as_ref()));
        Ok(())
    }

    async fn queue_watch(&self, updates: Option<u32>) -> Result<()> {
        let mut controller = self.queue_controller(true);
        let mut changes = controller.subscribe();
        let mut shown = 0;
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    ft_info!("queue watch interrupted");
                    break;
                }
            }
            if controller.sync() {
                print!("{}", render::queue(&controller.state().view(), None));
                shown += 1;
                if updates.is_some_and(|limit| shown >= limit) {
                    break;
                }
            }
        }
        controller.poller().stop_polling();
        Ok(())
    }

    async fn queue_remove(&self, id: String) -> Result<()> {
        let mut controller = self.queue_controller(false);
        controller.refresh().await;
        ensure_loaded(controller.state())?;
        if controller.state().item(&id).is_none() {
            bail!("no queue entry with id {id}");
        }

        controller
            .dispatch(PageMsg::ActionRequested {
                key: id.clone(),
                action: QueueAction::Remove,
                change: OptimisticChange::Remove,
                mode: UpdateMode::AfterConfirm,
            })
            .await;
        confirmed(controller.state(), &id)
            .map_err(|error| anyhow!("could not remove {id}: {error}"))?;
        if let Some(error) = controller.state().error() {
            ft_warn!("queue not refreshed after removing {id}: {error}");
        }
        println!("removed {id}; {} left in queue", controller.state().items().len());
        Ok(())
    }

    async fn progress(&self, args: &ListArgs) -> Result<()> {
        let training = self.training();
        let mut controller: ListController<ProgressFolder, ()> = ListController::new(
            Some(self.domain()),
            self.config.poll_interval(),
            false,
            move |scope: Option<String>| {
                let training = training.clone();
                async move {
                    training
                        .training_progress(scope.as_deref().unwrap_or_default())
                        .await
                }
            },
            |_folder: String, _action: ()| async { Ok(()) },
        )
        .with_page_size(args.page_size);
        controller.refresh().await;
        ensure_loaded(controller.state())?;
        apply_list_args(&mut controller, args).await;
        print!("{}", render::progress(&controller.view()));
        Ok(())
    }

    async fn choices(&self) -> Result<()> {
        let automated = self.automated();
        let countries = automated.countries().await?;
        let occupations = automated.occupations().await?;
        print!("{}", render::choices("Countries", &countries));
        print!("{}", render::choices("Occupations", &occupations));
        match self.training().occupations().await {
            Ok(manual) => print!("{}", render::choices("Name generation occupations", &manual)),
            Err(err) => ft_warn!("name generation occupations unavailable: {err}"),
        }
        Ok(())
    }

    async fn candidates(
        &self,
        country: &str,
        occupation: &str,
        start: bool,
        watch: bool,
    ) -> Result<()> {
        let automated = self.automated();
        let domain = self.domain();
        let batch = automated
            .generate_candidates(country, occupation, &domain)
            .await?;

        let (page, _) = update(
            PageState::<CandidateItem, ()>::default(),
            PageMsg::ListFetched(batch.candidates.clone()),
        );
        let selected: Vec<CandidateItem> = page.selected_items().into_iter().cloned().collect();
        print!("{}", render::candidates(&batch, selected.len()));

        if !start {
            return Ok(());
        }
        if selected.is_empty() {
            println!("no new people to train");
            return Ok(());
        }
        let started = automated.start_batch(&selected, &domain).await?;
        println!(
            "started batch {} for {} people",
            started.batch_id, started.total_people
        );
        if watch {
            self.watch_batch(started.batch_id).await?;
        }
        Ok(())
    }

    fn batch_tracker(&self, batch_id: String, auto_start: bool) -> JobTracker {
        let automated = self.automated();
        JobTracker::new(
            Some(batch_id),
            self.config.poll_interval(),
            auto_start,
            move |batch_id| {
                let automated = automated.clone();
                async move { automated.batch_status(&batch_id).await }
            },
        )
    }

    async fn watch_batch(&self, batch_id: String) -> Result<()> {
        let tracker = self.batch_tracker(batch_id, true);
        let snapshot = follow(&tracker, "batch").await;
        outcome(&snapshot)
    }

    async fn cancel_batch(&self, batch_id: String) -> Result<()> {
        let tracker = self.batch_tracker(batch_id.clone(), false);
        let automated = self.automated();
        let cancel = automated.cancel_batch(&batch_id);
        let response = tracker.cancel(cancel).await?;
        println!("{}", response.message.as_deref().unwrap_or("cancel requested"));
        println!("{}", render::job_line("batch", &tracker.snapshot()));
        Ok(())
    }

    fn staging_controller(&self) -> ListController<FolderSummary, StagingAction> {
        let automated = self.automated();
        let remover = automated.clone();
        let domain = self.domain();
        ListController::new(
            Some(domain.clone()),
            self.config.poll_interval(),
            false,
            move |scope: Option<String>| {
                let automated = automated.clone();
                async move {
                    automated
                        .staging_list(scope.as_deref().unwrap_or_default())
                        .await
                }
            },
            move |folder: String, _action: StagingAction| {
                let remover = remover.clone();
                let domain = domain.clone();
                async move {
                    remover
                        .remove_from_staging(&[folder], &domain)
                        .await
                        .map(|_| ())
                }
            },
        )
    }

    async fn staging_list(&self, args: &ListArgs) -> Result<()> {
        let mut controller = self.staging_controller().with_page_size(args.page_size);
        controller.refresh().await;
        ensure_loaded(controller.state())?;
        apply_list_args(&mut controller, args).await;
        print!("{}", render::staging(&controller.view()));
        Ok(())
    }

    async fn staging_deploy(&self, folders: Vec<String>) -> Result<()> {
        let automated = self.automated();
        let domain = self.domain();
        let folders = if folders.is_empty() {
            automated
                .staging_list(&domain)
                .await?
                .into_iter()
                .filter(|folder| folder.ready_for_production)
                .map(|folder| folder.folder_name)
                .collect()
        } else {
            folders
        };
        if folders.is_empty() {
            println!("no folders ready for production");
            return Ok(());
        }

        let report = automated.deploy_to_production(&folders, &domain).await?;
        print!("{}", render::deploy(&report));
        Ok(())
    }

    /// Each folder is dropped from the list right away and restored if the
    /// server refuses.
    async fn staging_remove(&self, folders: Vec<String>) -> Result<()> {
        let mut controller = self.staging_controller();
        controller.refresh().await;
        ensure_loaded(controller.state())?;

        let mut failures = Vec::new();
        for folder in folders {
            controller
                .dispatch(PageMsg::ActionRequested {
                    key: folder.clone(),
                    action: StagingAction::Remove,
                    change: OptimisticChange::Remove,
                    mode: UpdateMode::Immediate,
                })
                .await;
            if let Err(error) = confirmed(controller.state(), &folder) {
                failures.push(format!("{folder}: {error}"));
            }
            controller.dispatch(PageMsg::ClearError).await;
        }

        print!("{}", render::staging(&controller.view()));
        if !failures.is_empty() {
            bail!("some folders were not removed:\n{}", failures.join("\n"));
        }
        Ok(())
    }

    async fn upload(&self, path: &Path, interval: f64, sync: bool, watch: bool) -> Result<()> {
        let domain = self.domain();
        let file = UploadFile::from_path(path).await?;
        let upload = VideoUpload::new(file, domain.clone()).interval(interval);
        let video = self.video();
        let mut history = self.store.load_history();

        if sync {
            let result = video.upload_sync(upload).await?;
            if let Some(video_id) = result.field("video_id").and_then(|value| value.as_str()) {
                history.track_started(HistoryEntry::new(video_id, Some(domain), now()));
                if result.phase() == JobPhase::Completed {
                    history.mark_completed(video_id, &now());
                }
                self.save_history(&history);
            }
            print!("{}", render::sync_result(&result));
            return Ok(());
        }

        let accepted = video.upload_async(upload).await?;
        history.track_started(HistoryEntry::new(&accepted.video_id, Some(domain), now()));
        self.save_history(&history);
        println!(
            "{}; video id {}",
            accepted.message.as_deref().unwrap_or("upload accepted"),
            accepted.video_id
        );
        if watch {
            self.watch_video(accepted.video_id, &mut history).await?;
        }
        Ok(())
    }

    async fn watch_video(&self, video_id: String, history: &mut JobHistory) -> Result<()> {
        let video = self.video();
        let tracker = JobTracker::new(
            Some(video_id.clone()),
            self.config.poll_interval(),
            true,
            move |video_id| {
                let video = video.clone();
                async move { video.status(&video_id).await }
            },
        );
        let snapshot = follow(&tracker, "video").await;

        if let Some(status) = &snapshot.status {
            if record_status(history, &video_id, status.phase()) {
                self.save_history(history);
            }
            if let Some(statistics) = status.response.field("statistics") {
                println!("statistics: {statistics}");
            }
        }
        outcome(&snapshot)
    }

    async fn recent(&self, recheck: bool, clear_completed: bool) -> Result<()> {
        let mut history = self.store.load_history();
        let mut changed = false;
        if clear_completed && !history.completed.is_empty() {
            history.clear_completed();
            changed = true;
        }
        if recheck {
            let video = self.video();
            for video_id in history.ids_to_recheck() {
                match video.status(&video_id).await {
                    Ok(status) => changed |= record_status(&mut history, &video_id, status.phase()),
                    Err(err) => ft_warn!("could not recheck {video_id}: {err}"),
                }
            }
        }
        if changed {
            self.save_history(&history);
        }
        print!("{}", render::history(&history));
        Ok(())
    }

    async fn storage(&self, action: StorageCommand) -> Result<()> {
        let storage = StorageService::new(self.transport.clone());
        match action {
            StorageCommand::Stats => print!("{}", render::storage(&storage.stats().await?)),
            StorageCommand::Videos => print!("{}", render::videos(&storage.videos().await?)),
            StorageCommand::Delete { video_id } => {
                let response = storage.delete_video(&video_id).await?;
                let mut history = self.store.load_history();
                if history.forget(&video_id) {
                    self.save_history(&history);
                }
                println!("{}", response.message.as_deref().unwrap_or("video deleted"));
            }
            StorageCommand::Cleanup { days } => {
                let report = storage.cleanup_old_videos(days).await?;
                println!(
                    "deleted {} videos older than {} days",
                    report.videos_deleted, report.days_threshold
                );
            }
        }
        Ok(())
    }

    async fn ab(&self, action: AbCommand) -> Result<()> {
        let ab = AbTestingService::new(self.transport.clone());
        match action {
            AbCommand::Compare {
                image,
                image_id,
                ground_truth,
            } => {
                let mut upload = ComparisonUpload::new(UploadFile::from_path(image).await?);
                upload.image_id = image_id;
                upload.ground_truth = ground_truth;
                print!("{}", render::comparison(&ab.run_comparison(upload).await?));
            }
            AbCommand::Metrics {
                weekly,
                date,
                watch: false,
                ..
            } => {
                let summary = fetch_metrics(&ab, weekly, date.as_deref()).await?;
                print!("{}", render::metrics(period(weekly), &summary));
            }
            AbCommand::Metrics {
                weekly,
                date,
                updates,
                ..
            } => self.metrics_watch(ab, weekly, date, updates).await,
            AbCommand::Health => print!("{}", render::health(&ab.health().await?)),
        }
        Ok(())
    }

    async fn metrics_watch(
        &self,
        ab: AbTestingService,
        weekly: bool,
        date: Option<String>,
        updates: Option<u32>,
    ) {
        let poller = Poller::new(
            move || {
                let ab = ab.clone();
                let date = date.clone();
                async move { fetch_metrics(&ab, weekly, date.as_deref()).await }
            },
            self.config.metrics_poll_interval(),
            true,
        );
        let mut changes = poller.subscribe();
        let mut shown = 0;
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    ft_info!("metrics watch interrupted");
                    break;
                }
            }
            let state = changes.borrow_and_update().clone();
            if state.loading {
                continue;
            }
            match (&state.error, &state.data) {
                (Some(error), _) => println!("error: {error}"),
                (None, Some(summary)) => print!("{}", render::metrics(period(weekly), summary)),
                (None, None) => continue,
            }
            shown += 1;
            if updates.is_some_and(|limit| shown >= limit) {
                break;
            }
        }
        poller.stop_polling();
    }

    fn smart_controller(&self) -> ListController<SmartQueueEntry, SmartAction> {
        let smart = self.smart_training();
        let actions = smart.clone();
        let domain = self.domain();
        ListController::new(
            Some(domain.clone()),
            self.config.poll_interval(),
            false,
            move |scope: Option<String>| {
                let smart = smart.clone();
                async move {
                    let queue = smart.queue(scope.as_deref().unwrap_or_default()).await?;
                    Ok::<_, ApiError>(queue.queue)
                }
            },
            move |person: String, action: SmartAction| {
                let actions = actions.clone();
                let domain = domain.clone();
                async move {
                    let response = match action {
                        SmartAction::Remove => actions.remove_from_queue(&person, &domain).await?,
                        SmartAction::Promote => {
                            actions
                                .update_priority(&person, Priority::High, &domain, true)
                                .await?
                        }
                    };
                    ft_debug!("{person}: {}", response.message.unwrap_or_default());
                    Ok::<(), ApiError>(())
                }
            },
        )
    }

    async fn smart(&self, action: SmartCommand) -> Result<()> {
        let smart = self.smart_training();
        let domain = self.domain();
        match action {
            SmartCommand::Queue(args) => {
                let mut controller = self.smart_controller().with_page_size(args.page_size);
                controller.refresh().await;
                ensure_loaded(controller.state())?;
                apply_list_args(&mut controller, &args).await;
                print!("{}", render::smart_queue(&controller.view()));
            }
            SmartCommand::Add {
                person,
                priority,
                wikidata_id,
            } => {
                let mut entry = SmartQueueEntry::new(person, priority.into());
                entry.wikidata_id = wikidata_id;
                let response = smart.add_to_queue(&entry, &domain).await?;
                println!("{}", response.message.as_deref().unwrap_or("added to queue"));
            }
            SmartCommand::Remove { person } => {
                self.smart_queue_action(person, SmartAction::Remove).await?
            }
            SmartCommand::Promote { person } => {
                self.smart_queue_action(person, SmartAction::Promote).await?
            }
            SmartCommand::Run {
                no_discover,
                no_benchmark,
                max_discoveries,
                max_training,
                images_per_person,
            } => {
                let config = SmartCycleConfig {
                    discover_new: !no_discover,
                    benchmark_existing: !no_benchmark,
                    max_new_discoveries: max_discoveries,
                    max_training_per_run: max_training,
                    images_per_person,
                    ..SmartCycleConfig::new(domain)
                };
                let started = smart.start_cycle(&config).await?;
                let run = started
                    .run_id
                    .map(|id| format!(" (run {id})"))
                    .unwrap_or_default();
                println!(
                    "{}{run}",
                    started.message.as_deref().unwrap_or("cycle started")
                );
            }
            SmartCommand::Runs => print!("{}", render::smart_runs(&smart.runs(&domain).await?)),
            SmartCommand::Benchmark { person, images } => {
                let result = smart.benchmark_person(&person, &domain, images).await?;
                print!("{}", render::benchmark(&result));
            }
            SmartCommand::Candidates { min_score } => {
                let entries = smart.benchmark_candidates(&domain, min_score).await?;
                print!("{}", render::benchmark_candidates(&entries));
            }
            SmartCommand::Discover {
                country,
                max_results,
            } => {
                let country = country.unwrap_or(domain);
                let found = smart.discover_trending(&country, max_results).await?;
                print!("{}", render::celebrities(&found));
            }
        }
        Ok(())
    }

    /// Removal waits for the server; promotion shows at once and is undone
    /// if refused.
    async fn smart_queue_action(&self, person: String, action: SmartAction) -> Result<()> {
        let mut controller = self.smart_controller();
        controller.refresh().await;
        ensure_loaded(controller.state())?;
        let Some(entry) = controller.state().item(&person) else {
            bail!("{person} is not in the training queue");
        };

        let (change, mode, verb) = match action {
            SmartAction::Remove => (OptimisticChange::Remove, UpdateMode::AfterConfirm, "remove"),
            SmartAction::Promote => (
                OptimisticChange::Replace(entry.promoted()),
                UpdateMode::Immediate,
                "promote",
            ),
        };
        controller
            .dispatch(PageMsg::ActionRequested {
                key: person.clone(),
                action,
                change,
                mode,
            })
            .await;
        confirmed(controller.state(), &person)
            .map_err(|error| anyhow!("could not {verb} {person}: {error}"))?;
        if let Some(error) = controller.state().error() {
            ft_warn!("training queue not refreshed: {error}");
        }
        print!("{}", render::smart_queue(&controller.view()));
        Ok(())
    }

    fn merge_controller(&self) -> ListController<MergeCandidate, MergeAction> {
        let merge = self.merge_candidates();
        let actions = merge.clone();
        let domain = self.domain();
        ListController::new(
            Some(domain.clone()),
            self.config.poll_interval(),
            false,
            move |scope: Option<String>| {
                let merge = merge.clone();
                async move {
                    let domain = scope.unwrap_or_default();
                    let scan = merge.candidates(&domain).await?;
                    Ok::<_, ApiError>(scan.candidates)
                }
            },
            move |key: String, action: MergeAction| {
                let actions = actions.clone();
                let domain = domain.clone();
                async move {
                    let index = key.parse::<usize>().map_err(|_| {
                        ApiError::new(FailureKind::Validation, format!("bad candidate {key}"))
                    })?;
                    actions
                        .execute_action(index, &action, &domain)
                        .await
                        .map(|_| ())
                }
            },
        )
    }

    async fn merge(&self, action: MergeCommand) -> Result<()> {
        let merge = self.merge_candidates();
        let domain = self.domain();
        match action {
            MergeCommand::List(args) => {
                let mut controller = self.merge_controller().with_page_size(args.page_size);
                controller.refresh().await;
                ensure_loaded(controller.state())?;
                apply_list_args(&mut controller, &args).await;
                print!("{}", render::merge_candidates(&controller.view()));
            }
            MergeCommand::Scan => {
                let scan = merge.scan(&domain).await?;
                ft_info!("merge scan of {domain}: {} candidates", scan.total_candidates);
                print!("{}", render::merge_scan(&scan));
            }
            MergeCommand::Act {
                action,
                indices,
                new_name,
                swap,
            } => {
                let action = match action {
                    MergeActionArg::Merge => MergeAction::Merge { swap },
                    MergeActionArg::Rename => MergeAction::Rename {
                        new_name: new_name.ok_or_else(|| anyhow!("rename needs --new-name"))?,
                    },
                    MergeActionArg::Delete => MergeAction::Delete,
                    MergeActionArg::Skip => MergeAction::Skip,
                };
                self.merge_act(action, indices).await?;
            }
            MergeCommand::Persons { source, target } => {
                let response = merge.merge_persons(&source, &target, &domain).await?;
                println!("{}", response.message.as_deref().unwrap_or("persons merged"));
            }
        }
        Ok(())
    }

    /// Candidates are addressed by position, and each confirmed action
    /// shifts the ones after it, so the highest positions go first.
    async fn merge_act(&self, action: MergeAction, mut indices: Vec<usize>) -> Result<()> {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        let mut controller = self.merge_controller();
        controller.refresh().await;
        ensure_loaded(controller.state())?;

        let mut failures = Vec::new();
        for index in indices {
            let key = index.to_string();
            if controller.state().item(&key).is_none() {
                failures.push(format!("{index}: no such candidate"));
                continue;
            }
            controller
                .dispatch(PageMsg::ActionRequested {
                    key: key.clone(),
                    action: action.clone(),
                    change: OptimisticChange::Remove,
                    mode: UpdateMode::AfterConfirm,
                })
                .await;
            match confirmed(controller.state(), &key) {
                Ok(()) => ft_info!("{} applied to merge candidate {index}", action.as_str()),
                Err(error) => failures.push(format!("{index}: {error}")),
            }
            controller.dispatch(PageMsg::ClearError).await;
        }

        print!("{}", render::merge_candidates(&controller.view()));
        if !failures.is_empty() {
            bail!("some candidates were not handled:\n{}", failures.join("\n"));
        }
        Ok(())
    }

    fn save_history(&self, history: &JobHistory) {
        if let Err(err) = self.store.save_history(history) {
            ft_error!("Failed to save history: {err}");
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Move a video between history lists according to its latest status.
/// Returns whether the history changed.
fn record_status(history: &mut JobHistory, video_id: &str, phase: JobPhase) -> bool {
    match phase {
        JobPhase::Processing => false,
        JobPhase::Completed => history.mark_completed(video_id, &now()),
        JobPhase::Failed | JobPhase::NotFound => {
            ft_debug!("dropping {video_id} from history: {phase:?}");
            history.processing.forget(video_id).is_some()
        }
    }
}

/// How the server answered the action on `key`. A failed list refresh
/// afterwards does not turn a confirmed action into a failure.
fn confirmed<T: ListItem, A: Clone>(page: &PageState<T, A>, key: &str) -> Result<(), String> {
    match page.last_action() {
        Some(ActionOutcome::Succeeded { key: done }) if done == key => Ok(()),
        Some(ActionOutcome::Failed { key: failed, message }) if failed == key => {
            Err(message.clone())
        }
        _ => Err("action was not sent".to_string()),
    }
}

/// A list that never loaded is an error; a later failed refresh is shown
/// on the page instead.
fn ensure_loaded<T: ListItem, A: Clone>(page: &PageState<T, A>) -> Result<()> {
    match (page.is_loaded(), page.error()) {
        (false, Some(error)) => bail!("{error}"),
        _ => Ok(()),
    }
}

async fn apply_list_args<T, A>(controller: &mut ListController<T, A>, args: &ListArgs)
where
    T: ListItem + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    if let Some(filter) = &args.filter {
        let msg = PageMsg::FilterChanged(filter.clone());
        controller.dispatch(msg).await;
    }
    controller.dispatch(PageMsg::PageChanged(args.page)).await;
}

/// Print each change of a tracked job until it is terminal, polling stops,
/// or the user interrupts.
async fn follow(tracker: &JobTracker, label: &str) -> JobSnapshot {
    let mut updates = tracker.subscribe();
    let mut last_line = String::new();
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if !snapshot.loading {
            let line = render::job_line(label, &snapshot);
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
        }
        let stopped = !snapshot.is_polling && !snapshot.loading && snapshot.outcome.is_some();
        if snapshot.is_terminal() || stopped {
            return snapshot;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return tracker.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                ft_info!("stopped following {label}");
                tracker.stop_polling();
                return tracker.snapshot();
            }
        }
    }
}

fn period(weekly: bool) -> &'static str {
    if weekly {
        "weekly"
    } else {
        "daily"
    }
}

async fn fetch_metrics(
    ab: &AbTestingService,
    weekly: bool,
    date: Option<&str>,
) -> Result<MetricsSummary, ApiError> {
    if weekly {
        ab.weekly_metrics().await
    } else {
        ab.daily_metrics(date).await
    }
}

fn outcome(snapshot: &JobSnapshot) -> Result<()> {
    match snapshot.outcome {
        Some(JobPhase::Failed | JobPhase::NotFound) => {
            bail!("{}", snapshot.error.as_deref().unwrap_or("job failed"))
        }
        _ => Ok(()),
    }
}
