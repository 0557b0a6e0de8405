//! # Deployment Pipeline
//!
//! The pipeline runs every component in dependency order and bundles their
//! results into a [`Deployment`]:
//!
//! 1.  **Project**: load the merged project configuration and pick the
//!     blueprint.
//! 2.  **Connectivity**: probe the network. Actions that need it fail,
//!     the others skip remote repository checks.
//! 3.  **Repositories**: verify (or clone, on `init`) every enabled
//!     repository and the project upstream.
//! 4.  **Layers**: load and merge the compose layer stack, then expand
//!     variable references with the project environment.
//! 5.  **Activation**: compute the active service set and run the
//!     placeholder gate.
//! 6.  **Builds**: resolve template builds, validate the build cache and
//!     build what must be built.
//! 7.  **Env file**: write the derived env file when missing or forced.
//!
//! All external facts flow in through [`Collaborators`], so the whole
//! pipeline can run against fakes.

use log::{debug, info, warn, LevelFilter};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::activation::{self, ActiveServiceSet};
use crate::build_cache::{self, BuildMode, BuildPlan, ImageInspector, SourceHistory};
use crate::builds::{self, ResolvedBuilds};
use crate::compose::{ComposeBackend, ComposeCommand, DockerCompose, DockerImages};
use crate::config::Interpolator;
use crate::defaults::{CONTAINERS_DIR, ENV_FILE, SPECS_DIR};
use crate::dockerfile::{DockerfileSource, FsDockerfileSource};
use crate::envfile;
use crate::error::{Error, Result};
use crate::git::GitHistory;
use crate::layers::{self, FileLayerSource, LayerSource, LoadedConfig};
use crate::network::{Connectivity, TcpProbe};
use crate::project::{ProjectConfig, Projectrc};
use crate::repository::{
    DefaultGitOperations, GitOperations, RepositoryReport, RepositorySyncManager, SyncOptions,
};

/// Every action the CLI can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Check,
    Init,
    Update,
    Build,
    Start,
    Stop,
    Restart,
    Status,
    Remove,
    Logs,
    Shell,
    Env,
    Tree,
}

const ACTIONS: &[(&str, Action)] = &[
    ("check", Action::Check),
    ("init", Action::Init),
    ("update", Action::Update),
    ("build", Action::Build),
    ("start", Action::Start),
    ("stop", Action::Stop),
    ("restart", Action::Restart),
    ("status", Action::Status),
    ("remove", Action::Remove),
    ("logs", Action::Logs),
    ("shell", Action::Shell),
    ("env", Action::Env),
    ("tree", Action::Tree),
];

impl Action {
    pub fn name(self) -> &'static str {
        ACTIONS
            .iter()
            .find(|(_, action)| *action == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// The compose command that carries out the action on `services`.
    ///
    /// Actions with no single compose counterpart are `NotImplemented`.
    pub fn compose_command(self, services: Vec<String>) -> Result<ComposeCommand> {
        Ok(match self {
            Action::Build => ComposeCommand::Build { services },
            Action::Start => ComposeCommand::Up { services },
            Action::Stop => ComposeCommand::Stop { services },
            Action::Restart => ComposeCommand::Restart { services },
            Action::Status => ComposeCommand::Ps,
            Action::Remove => ComposeCommand::Down,
            other => {
                return Err(Error::NotImplemented {
                    feature: format!("{} as a compose command", other),
                })
            }
        })
    }

    /// Clones missing repositories and configures remotes.
    pub fn initializes(self) -> bool {
        self == Action::Init
    }

    /// Pulls repositories.
    pub fn updates(self) -> bool {
        self == Action::Update
    }

    /// A failed connectivity check aborts the run.
    pub fn requires_network(self) -> bool {
        matches!(self, Action::Init | Action::Update)
    }

    pub fn syncs_repositories(self) -> bool {
        self != Action::Tree
    }

    pub fn checks_placeholders(self) -> bool {
        !matches!(self, Action::Init | Action::Tree)
    }

    pub fn writes_env(self) -> bool {
        self != Action::Tree
    }

    /// Build cache handling, `None` when the cache is not validated.
    pub fn build_mode(self, force_build: bool) -> Option<BuildMode> {
        match self {
            Action::Check | Action::Build | Action::Start | Action::Restart if force_build => {
                Some(BuildMode::Force)
            }
            Action::Check => Some(BuildMode::CheckOnly),
            Action::Build | Action::Start | Action::Restart => Some(BuildMode::AllowBuild),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run settings, built from CLI flags and `.projectrc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub blueprint: Option<String>,
    pub force_build: bool,
    pub skip_network: bool,
    /// Repositories excluded from synchronization.
    pub skip_repos: Vec<String>,
    pub force_env: bool,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            blueprint: None,
            force_build: false,
            skip_network: false,
            skip_repos: Vec::new(),
            force_env: false,
            log_level: LevelFilter::Info,
        }
    }
}

impl Settings {
    /// Fills unset values from `.projectrc`. Explicit flags take precedence.
    pub fn apply_projectrc(&mut self, rc: &Projectrc) {
        if self.blueprint.is_none() {
            self.blueprint = rc.blueprint.clone();
        }
        self.force_build |= rc.force_build.unwrap_or(false);
        self.skip_network |= rc.skip_network.unwrap_or(false);
        self.force_env |= rc.force_env.unwrap_or(false);
        for repo in &rc.skip_repo {
            if !self.skip_repos.contains(repo) {
                self.skip_repos.push(repo.clone());
            }
        }
    }

    pub fn containers_dir(&self) -> PathBuf {
        self.project_dir.join(CONTAINERS_DIR)
    }

    pub fn env_file(&self) -> PathBuf {
        self.project_dir.join(ENV_FILE)
    }
}

/// External collaborators of the pipeline.
pub struct Collaborators {
    pub git: Arc<dyn GitOperations>,
    pub layers: Box<dyn LayerSource>,
    pub dockerfiles: Box<dyn DockerfileSource>,
    pub images: Box<dyn ImageInspector>,
    pub history: Box<dyn SourceHistory>,
    pub backend: Box<dyn ComposeBackend>,
    pub connectivity: Box<dyn Connectivity>,
}

impl Collaborators {
    /// Real collaborators for the project rooted at `project_dir`.
    pub fn system(project_dir: &Path) -> Self {
        let containers = project_dir.join(CONTAINERS_DIR);
        Self {
            git: Arc::new(DefaultGitOperations),
            layers: Box::new(FileLayerSource::new(&containers)),
            dockerfiles: Box::new(FsDockerfileSource::new(&containers)),
            images: Box::new(DockerImages),
            history: Box::new(GitHistory),
            backend: Box::new(DockerCompose::new(project_dir)),
            connectivity: Box::new(TcpProbe::default()),
        }
    }
}

/// Everything a run decided.
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    pub project: ProjectConfig,
    pub blueprint: String,
    pub online: bool,
    pub repositories: Vec<RepositoryReport>,
    pub config: LoadedConfig,
    pub active: ActiveServiceSet,
    pub builds: ResolvedBuilds,
    /// `None` when the action does not validate the build cache.
    pub plan: Option<BuildPlan>,
    /// Templates built during the run.
    pub built: Vec<String>,
    pub env_file: PathBuf,
    pub env_written: bool,
    /// Run-level advisory messages.
    pub warnings: Vec<String>,
}

impl Deployment {
    /// Active services that declare a build, one per image.
    pub fn active_builds(&self) -> Vec<String> {
        let buildable: Vec<String> = self
            .active
            .iter()
            .filter(|name| {
                self.config
                    .services
                    .get(*name)
                    .is_some_and(|s| s.build.is_some())
            })
            .map(str::to_string)
            .collect();
        self.unique_builds(&buildable)
    }

    /// Drops services whose image is already built by an earlier one.
    ///
    /// Services without an image, or unknown to the configuration, are
    /// always kept.
    pub fn unique_builds(&self, services: &[String]) -> Vec<String> {
        let mut images = HashSet::new();
        services
            .iter()
            .filter(|name| {
                match self.config.services.get(*name).and_then(|s| s.image.as_deref()) {
                    Some(image) => images.insert(image),
                    None => true,
                }
            })
            .cloned()
            .collect()
    }
}

pub struct Pipeline {
    settings: Settings,
    collaborators: Collaborators,
}

impl Pipeline {
    /// Creates a pipeline backed by git, docker and the filesystem.
    pub fn new(settings: Settings) -> Self {
        let collaborators = Collaborators::system(&settings.project_dir);
        Self {
            settings,
            collaborators,
        }
    }

    /// Creates a pipeline with custom collaborators.
    pub fn with_collaborators(settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs a compose command against a prepared deployment.
    pub fn run(&self, deployment: &Deployment, command: &ComposeCommand) -> Result<()> {
        self.collaborators
            .backend
            .run(&deployment.config.files, &deployment.env_file, command)
    }

    /// Runs every stage required by `action`.
    pub fn prepare(&self, action: Action) -> Result<Deployment> {
        let project_dir = &self.settings.project_dir;
        inspect_project(project_dir)?;

        let host = Projectrc::load(project_dir)?.project_configuration;
        let project = ProjectConfig::load(project_dir, host.as_ref())?;
        let blueprint = self
            .settings
            .blueprint
            .clone()
            .or_else(|| project.blueprint.clone())
            .ok_or_else(|| Error::Configuration {
                message: "No blueprint selected".to_string(),
                hint: Some("use -b/--blueprint <NAME> or set `blueprint:` in .projectrc".to_string()),
            })?;
        info!("Blueprint: {}", blueprint);

        let mut deployment = Deployment {
            blueprint,
            env_file: self.settings.env_file(),
            ..Deployment::default()
        };

        if action.syncs_repositories() {
            deployment.online = self.check_network(action, &mut deployment.warnings)?;
            deployment.repositories = self.sync_repositories(action, &project, deployment.online)?;
        }

        let env = self.environment(&project, project_dir);
        deployment.config = self.load_layers(&deployment.blueprint, &project, &env)?;
        debug!("Compose files: {:?}", deployment.config.files);

        deployment.active = activation::find_active(&deployment.config.services)?;
        info!("Active services: {}", deployment.active.join(", "));
        if action.checks_placeholders() {
            activation::check_placeholders(&deployment.config.services, &deployment.active)?;
        }

        if !action.initializes() {
            deployment.builds = builds::locate_builds(
                &deployment.config.base_services,
                &deployment.config.services,
                self.collaborators.dockerfiles.as_ref(),
            )?;
            if let Some(mode) = action.build_mode(self.settings.force_build) {
                let plan = build_cache::validate(
                    &deployment.builds.graph,
                    self.collaborators.images.as_ref(),
                    self.collaborators.history.as_ref(),
                    mode,
                )?;
                deployment.warnings.extend(plan.warnings.iter().cloned());
                deployment.plan = Some(plan);
            }
        }

        if action.writes_env() {
            deployment.env_written = self.write_env(&env, &deployment.active)?;
        }

        if !action.initializes() {
            deployment.built = self.build_templates(&deployment)?;
        }

        deployment.project = project;
        Ok(deployment)
    }

    fn check_network(&self, action: Action, warnings: &mut Vec<String>) -> Result<bool> {
        if self.settings.skip_network {
            if action.requires_network() {
                warn!("Network checks disabled, {} may fail", action);
            }
            return Ok(false);
        }
        match self.collaborators.connectivity.check() {
            Ok(()) => Ok(true),
            Err(e) if action.requires_network() => Err(e),
            Err(e) => {
                let message = format!("{}. Skipping remote repository checks", e);
                warn!("{}", message);
                warnings.push(message);
                Ok(false)
            }
        }
    }

    fn sync_repositories(
        &self,
        action: Action,
        project: &ProjectConfig,
        online: bool,
    ) -> Result<Vec<RepositoryReport>> {
        let manager = RepositorySyncManager::with_operations(
            Arc::clone(&self.collaborators.git),
            &self.settings.project_dir,
        );

        if let Some(upstream) = &project.variables.upstream {
            let path = PathBuf::from(upstream.path.as_deref().unwrap_or("."));
            manager.check_upstream(&path, &upstream.url, action.initializes())?;
        }

        let options = SyncOptions {
            fetch: online,
            update: action.updates(),
            initialize: action.initializes(),
        };
        manager.sync_all(&project.repositories(), &self.settings.skip_repos, options)
    }

    fn environment(&self, project: &ProjectConfig, project_dir: &Path) -> BTreeMap<String, String> {
        let mut env = project.env_variables();
        env.insert(
            "COMPOSE_PROJECT_NAME".to_string(),
            project.project_name(project_dir),
        );
        env
    }

    fn load_layers(
        &self,
        blueprint: &str,
        project: &ProjectConfig,
        env: &BTreeMap<String, String>,
    ) -> Result<LoadedConfig> {
        let stack = layers::default_layers(blueprint, project.variables.frontend);
        let mut loaded = layers::load_layers(&stack, self.collaborators.layers.as_ref())?;

        let interpolator = Interpolator::new(env)?;
        interpolator.apply(&mut loaded.services);
        interpolator.apply(&mut loaded.base_services);
        Ok(loaded)
    }

    fn write_env(&self, env: &BTreeMap<String, String>, active: &ActiveServiceSet) -> Result<bool> {
        let path = self.settings.env_file();
        if path.exists() && !self.settings.force_env {
            debug!("{} already exists, add --force-env to regenerate it", path.display());
            return Ok(false);
        }
        let mut vars = env.clone();
        vars.insert("ACTIVE_SERVICES".to_string(), active.join(","));
        envfile::write(&path, &vars)?;
        Ok(true)
    }

    fn build_templates(&self, deployment: &Deployment) -> Result<Vec<String>> {
        let Some(plan) = &deployment.plan else {
            return Ok(Vec::new());
        };

        let mut built = Vec::new();
        for image in &plan.to_build {
            let Some(template) = deployment.builds.graph.get(image) else {
                continue;
            };
            info!("Building template {} ({})", image, template.service);
            self.collaborators.backend.run(
                &deployment.config.base_files,
                &deployment.env_file,
                &ComposeCommand::Build {
                    services: vec![template.service.clone()],
                },
            )?;
            built.push(image.clone());
        }
        Ok(built)
    }
}

/// Fails early when `project_dir` does not look like a project.
pub fn inspect_project(project_dir: &Path) -> Result<()> {
    for dir in [SPECS_DIR, CONTAINERS_DIR] {
        let path = project_dir.join(dir);
        if !path.is_dir() {
            return Err(Error::Configuration {
                message: format!("Folder not found: {}", path.display()),
                hint: Some(format!(
                    "run the command from the project root or pass --project-dir ({} is not a blueprint project)",
                    project_dir.display()
                )),
            });
        }
    }
    Ok(())
}
