//! # Template Build Resolution
//!
//! Some services are not built from a public image but from a *template*: a
//! base image built once from a shared Dockerfile that project services then
//! extend with `FROM <template image>`. Before anything is built, the
//! templates a deployment really needs must be known, so they can be checked
//! for freshness (see [`crate::build_cache`]) and built first.
//!
//! Resolution runs in two steps:
//!
//! 1. [`find_template_builds`] registers every *base* service that declares a
//!    build context. Its `image` is the template tag.
//! 2. [`find_template_overrides`] reads the Dockerfile of every merged service
//!    with a build context. When the `FROM` reference designates a template
//!    it must be registered in step 1.
//!
//! [`locate_builds`] combines both steps and keeps only the templates that at
//! least one override actually references.

use log::debug;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::ServiceMap;
use crate::defaults::TEMPLATE_SUFFIX;
use crate::dockerfile::{self, DockerfileSource};
use crate::error::{Error, Result};

/// A base image built from a shared Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBuild {
    /// Image tag other Dockerfiles refer to.
    pub image: String,
    /// Representative service, first by name among `services`.
    pub service: String,
    /// Every base service building this image.
    pub services: Vec<String>,
    /// Build context, as declared.
    pub context: String,
    /// Dockerfile of the template, the file whose history decides staleness.
    pub dockerfile: PathBuf,
}

/// A service whose Dockerfile extends a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOverride {
    pub service: String,
    pub image: Option<String>,
    pub template: String,
}

/// Resolved templates keyed by image tag.
pub type BuildGraph = BTreeMap<String, TemplateBuild>;

/// Output of [`locate_builds`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBuilds {
    /// Templates referenced by at least one override.
    pub graph: BuildGraph,
    /// Every override found, in service name order.
    pub overrides: Vec<BuildOverride>,
}

/// Whether `reference` designates a template image.
///
/// A reference is a template reference when it carries the template tag
/// suffix, or when its repository matches the repository of a registered
/// template (so a mistyped tag is still caught).
pub fn is_template_reference(reference: &str, templates: &BuildGraph) -> bool {
    if reference.ends_with(TEMPLATE_SUFFIX) {
        return true;
    }
    let (repository, _) = dockerfile::split_image(reference);
    templates
        .keys()
        .any(|image| dockerfile::split_image(image).0 == repository)
}

/// Registers every base service with a build context as a template.
pub fn find_template_builds(
    base_services: &ServiceMap,
    source: &dyn DockerfileSource,
) -> Result<BuildGraph> {
    let mut templates = BuildGraph::new();

    for service in base_services.values() {
        let Some(build) = &service.build else {
            continue;
        };
        let image = service.image.clone().ok_or_else(|| Error::DependencyResolution {
            service: service.name.clone(),
            message: "template builds must declare an image".to_string(),
            hint: Some(format!(
                "add an `image:` tag to the {} service definition",
                service.name
            )),
        })?;

        match templates.get_mut(&image) {
            Some(existing) if existing.context == build.context => {
                existing.services.push(service.name.clone());
            }
            Some(existing) => {
                return Err(Error::DependencyResolution {
                    service: service.name.clone(),
                    message: format!(
                        "image {} is already built by {} from a different context ({} vs {})",
                        image, existing.service, existing.context, build.context
                    ),
                    hint: None,
                });
            }
            None => {
                debug!("Template {} is built by {}", image, service.name);
                templates.insert(
                    image.clone(),
                    TemplateBuild {
                        image,
                        service: service.name.clone(),
                        services: vec![service.name.clone()],
                        context: build.context.clone(),
                        dockerfile: source.dockerfile_path(build),
                    },
                );
            }
        }
    }

    Ok(templates)
}

/// Finds every service whose Dockerfile extends a registered template.
///
/// Template sources are checked like any other service, so a template may
/// extend another one. A template reference that is not registered is a
/// `DependencyResolution` error.
pub fn find_template_overrides(
    services: &ServiceMap,
    templates: &BuildGraph,
    source: &dyn DockerfileSource,
) -> Result<Vec<BuildOverride>> {
    let mut overrides = Vec::new();

    for service in services.values() {
        let Some(build) = &service.build else {
            continue;
        };

        let parsed = dockerfile::load(source, build)?;
        if service.image.as_deref() == Some(parsed.base_image.as_str()) {
            continue;
        }
        if !is_template_reference(&parsed.base_image, templates) {
            continue;
        }
        if !templates.contains_key(&parsed.base_image) {
            return Err(Error::DependencyResolution {
                service: service.name.clone(),
                message: format!("unable to find {} in this project", parsed.base_image),
                hint: Some(format!(
                    "inspect the FROM image in {}",
                    parsed.path.display()
                )),
            });
        }

        debug!("{} extends {}", service.name, parsed.base_image);
        overrides.push(BuildOverride {
            service: service.name.clone(),
            image: service.image.clone(),
            template: parsed.base_image,
        });
    }

    Ok(overrides)
}

/// Resolves the template builds needed by `services`.
pub fn locate_builds(
    base_services: &ServiceMap,
    services: &ServiceMap,
    source: &dyn DockerfileSource,
) -> Result<ResolvedBuilds> {
    let templates = find_template_builds(base_services, source)?;
    let overrides = find_template_overrides(services, &templates, source)?;

    let graph = templates
        .into_iter()
        .filter(|(image, _)| overrides.iter().any(|o| &o.template == image))
        .collect();

    Ok(ResolvedBuilds { graph, overrides })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceDefinition;
    use crate::dockerfile::testing::MemoryDockerfiles;
    use crate::layers::testing::services;

    fn template(name: &str, image: &str, context: &str) -> ServiceDefinition {
        ServiceDefinition::new(name)
            .with_image(image)
            .with_build(context)
    }

    #[test]
    fn test_override_resolves_to_template() {
        let base = services(vec![template("T", "base:tpl", "tpl")]);
        let mut merged = base.clone();
        merged.insert(
            "S".to_string(),
            ServiceDefinition::new("S").with_image("app:1").with_build("app"),
        );
        let source = MemoryDockerfiles::default()
            .with("tpl", "FROM ubuntu:22.04\n")
            .with("app", "FROM base:tpl\n");

        let resolved = locate_builds(&base, &merged, &source).unwrap();
        assert_eq!(resolved.graph.len(), 1);
        let entry = &resolved.graph["base:tpl"];
        assert_eq!(entry.service, "T");
        assert_eq!(entry.dockerfile, PathBuf::from("tpl/Dockerfile"));
        assert_eq!(
            resolved.overrides,
            vec![BuildOverride {
                service: "S".to_string(),
                image: Some("app:1".to_string()),
                template: "base:tpl".to_string(),
            }]
        );
    }

    #[test]
    fn test_dangling_template_reference() {
        let base = services(vec![template("T", "base:tpl", "tpl")]);
        let mut merged = base.clone();
        merged.insert(
            "S".to_string(),
            ServiceDefinition::new("S").with_build("app"),
        );
        let source = MemoryDockerfiles::default()
            .with("tpl", "FROM ubuntu\n")
            .with("app", "FROM base:missing\n");

        let err = locate_builds(&base, &merged, &source).unwrap_err();
        match &err {
            Error::DependencyResolution { service, message, .. } => {
                assert_eq!(service, "S");
                assert!(message.contains("base:missing"));
            }
            other => panic!("Expected dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_template_suffix_is_an_error() {
        let base = services(vec![template("T", "base:tpl", "tpl")]);
        let merged = services(vec![ServiceDefinition::new("S").with_build("app")]);
        let source = MemoryDockerfiles::default().with("app", "FROM other/image:template\n");

        assert!(matches!(
            locate_builds(&base, &merged, &source),
            Err(Error::DependencyResolution { .. })
        ));
    }

    #[test]
    fn test_template_without_image() {
        let base = services(vec![ServiceDefinition::new("T").with_build("tpl")]);
        let source = MemoryDockerfiles::default();

        let err = find_template_builds(&base, &source).unwrap_err();
        assert!(err.to_string().contains("template builds must declare an image"));
    }

    #[test]
    fn test_unreferenced_templates_are_dropped() {
        let base = services(vec![
            template("T", "base:tpl", "tpl"),
            template("U", "unused:tpl", "unused"),
        ]);
        let mut merged = base.clone();
        merged.insert("S".to_string(), ServiceDefinition::new("S").with_build("app"));
        let source = MemoryDockerfiles::default()
            .with("tpl", "FROM ubuntu:22.04\n")
            .with("unused", "FROM ubuntu:22.04\n")
            .with("app", "FROM base:tpl\n");

        let resolved = locate_builds(&base, &merged, &source).unwrap();
        let images: Vec<&str> = resolved.graph.keys().map(String::as_str).collect();
        assert_eq!(images, vec!["base:tpl"]);
    }

    #[test]
    fn test_public_base_images_are_not_overrides() {
        let base = services(vec![template("T", "base:tpl", "tpl")]);
        let merged = services(vec![ServiceDefinition::new("S").with_build("app")]);
        let source = MemoryDockerfiles::default().with("app", "FROM python:3.12-slim\n");

        let resolved = locate_builds(&base, &merged, &source).unwrap();
        assert!(resolved.graph.is_empty());
        assert!(resolved.overrides.is_empty());
    }

    #[test]
    fn test_shared_template_image() {
        let base = services(vec![
            template("celery", "rapydo/backend:template", "backend"),
            template("backend", "rapydo/backend:template", "backend"),
        ]);
        let source = MemoryDockerfiles::default();

        let templates = find_template_builds(&base, &source).unwrap();
        let entry = &templates["rapydo/backend:template"];
        assert_eq!(entry.service, "backend");
        assert_eq!(entry.services, vec!["backend", "celery"]);
    }

    #[test]
    fn test_conflicting_template_contexts() {
        let base = services(vec![
            template("a", "shared:template", "ctx-a"),
            template("b", "shared:template", "ctx-b"),
        ]);
        let source = MemoryDockerfiles::default();

        assert!(matches!(
            find_template_builds(&base, &source),
            Err(Error::DependencyResolution { .. })
        ));
    }

    #[test]
    fn test_broken_override_dockerfile_is_fatal() {
        let base = services(vec![template("T", "base:tpl", "tpl")]);
        let merged = services(vec![ServiceDefinition::new("S").with_build("app")]);
        let source = MemoryDockerfiles::default().with("app", "RUN true\n");

        assert!(matches!(
            locate_builds(&base, &merged, &source),
            Err(Error::Dockerfile { .. })
        ));
    }

    #[test]
    fn test_template_extending_unknown_template() {
        let base = services(vec![template("T", "base:template", "tpl")]);
        let source = MemoryDockerfiles::default().with("tpl", "FROM ghost:template\n");

        let err = locate_builds(&base, &base, &source).unwrap_err();
        match &err {
            Error::DependencyResolution { service, message, .. } => {
                assert_eq!(service, "T");
                assert!(message.contains("ghost:template"));
            }
            other => panic!("Expected dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_template_with_missing_dockerfile() {
        let base = services(vec![template("T", "base:template", "tpl")]);
        let source = MemoryDockerfiles::default();

        assert!(matches!(
            locate_builds(&base, &base, &source),
            Err(Error::Dockerfile { .. })
        ));
    }

    #[test]
    fn test_template_extending_template() {
        let base = services(vec![
            template("T", "base:template", "tpl"),
            template("U", "child:template", "child"),
        ]);
        let source = MemoryDockerfiles::default()
            .with("tpl", "FROM ubuntu:22.04\n")
            .with("child", "FROM base:template\n");

        let resolved = locate_builds(&base, &base, &source).unwrap();
        let images: Vec<&str> = resolved.graph.keys().map(String::as_str).collect();
        assert_eq!(images, vec!["base:template"]);
        assert_eq!(resolved.overrides[0].service, "U");
    }

    #[test]
    fn test_is_template_reference() {
        let mut graph = BuildGraph::new();
        graph.insert(
            "base:tpl".to_string(),
            TemplateBuild {
                image: "base:tpl".to_string(),
                service: "T".to_string(),
                services: vec!["T".to_string()],
                context: "tpl".to_string(),
                dockerfile: PathBuf::from("tpl/Dockerfile"),
            },
        );
        assert!(is_template_reference("base:tpl", &graph));
        assert!(is_template_reference("base:other", &graph));
        assert!(is_template_reference("x/y:template", &graph));
        assert!(!is_template_reference("ubuntu:22.04", &graph));
    }
}
