//! Route discovery: scanning declaration units into a route table.

use std::fs;
use std::path::{Path, PathBuf};

use lattice_container::Container;
use tracing::{debug, info, warn};

use crate::declare::HandlerUnit;
use crate::error::{Result, RouterError};
use crate::request::Method;
use crate::table::{HandlerRef, RouteSet};

/// File extension of handler declaration units.
const UNIT_EXTENSION: &str = "json";

/// Recursively collects all declaration units under the source root,
/// sorted by path for reproducible fingerprints.
///
/// # Errors
///
/// Returns [`RouterError::SourceRootMissing`] when the root is not a
/// directory, or an I/O error when traversal fails.
pub fn scan_units(source_root: &Path) -> Result<Vec<PathBuf>> {
    if !source_root.is_dir() {
        return Err(RouterError::SourceRootMissing(source_root.to_path_buf()));
    }

    let mut units = Vec::new();
    collect_units(source_root, &mut units)?;
    units.sort();
    Ok(units)
}

fn collect_units(dir: &Path, units: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| RouterError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| RouterError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_units(&path, units)?;
        } else if path.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
            units.push(path);
        }
    }

    Ok(())
}

/// Walks every declaration unit under the source root and compiles the
/// route table, the named-route index, and the error-handler table.
///
/// Units without a class name, units that fail to parse, units whose
/// class has no registered type descriptor, and routes whose path
/// template does not compile are skipped. Route entries keep traversal
/// order; the first structural match within one compiled table wins at
/// dispatch.
///
/// # Errors
///
/// Returns [`RouterError::SourceRootMissing`] when the source root does
/// not exist.
pub fn discover(
    source_root: &Path,
    namespace_prefix: &str,
    container: &Container,
) -> Result<RouteSet> {
    let units = scan_units(source_root)?;
    let mut set = RouteSet::new();

    for unit_path in &units {
        process_unit(unit_path, namespace_prefix, container, &mut set);
    }

    info!(
        units = units.len(),
        routes = set.routes.len(),
        errors = set.errors.len(),
        "route discovery complete"
    );
    Ok(set)
}

fn process_unit(
    unit_path: &Path,
    namespace_prefix: &str,
    container: &Container,
    set: &mut RouteSet,
) {
    let content = match fs::read_to_string(unit_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(unit = %unit_path.display(), error = %e, "unreadable declaration unit; skipping");
            return;
        }
    };

    let unit: HandlerUnit = match serde_json::from_str(&content) {
        Ok(unit) => unit,
        Err(e) => {
            warn!(unit = %unit_path.display(), error = %e, "malformed declaration unit; skipping");
            return;
        }
    };

    let Some(class) = unit.class.as_deref() else {
        debug!(unit = %unit_path.display(), "unit declares no class; skipping");
        return;
    };

    let full_class = qualify(namespace_prefix, unit.namespace.as_deref(), class);
    if !container.has_type(&full_class) {
        warn!(class = %full_class, unit = %unit_path.display(), "class not registered; skipping unit");
        return;
    }

    // Class-level metadata shared by every method in the unit.
    let (class_prefix, class_name_prefix, class_middleware) = match &unit.route {
        Some(meta) => (
            meta.path.trim_end_matches('/').to_string(),
            meta.name
                .as_deref()
                .map(|n| format!("{}.", n.trim_end_matches('.'))),
            meta.middleware(),
        ),
        None => (String::new(), None, Vec::new()),
    };

    for method_decl in &unit.methods {
        let handler = HandlerRef::new(full_class.clone(), method_decl.name.clone());

        for route in &method_decl.routes {
            let full_path = {
                let composed = format!("{}{}", class_prefix, route.path);
                if composed.is_empty() {
                    "/".to_string()
                } else {
                    composed
                }
            };

            let full_name = route.name.as_deref().map(|n| {
                format!("{}{}", class_name_prefix.as_deref().unwrap_or(""), n)
            });

            let mut middleware = class_middleware.clone();
            middleware.extend(route.middleware());

            for verb in route.verbs() {
                let Some(method) = Method::parse(&verb) else {
                    warn!(verb = %verb, unit = %unit_path.display(), "unknown HTTP verb; skipping");
                    continue;
                };
                if let Err(e) = set.add_route(
                    method,
                    full_path.clone(),
                    handler.clone(),
                    full_name.clone(),
                    middleware.clone(),
                ) {
                    warn!(path = %full_path, unit = %unit_path.display(), error = %e, "invalid path template; skipping route");
                }
            }
        }

        for error in &method_decl.errors {
            set.add_error(error.code.clone().into(), handler.clone());
        }
    }
}

/// Joins the discovery prefix, the unit namespace, and the class name
/// into a fully qualified class identifier.
fn qualify(prefix: &str, namespace: Option<&str>, class: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix);
    }
    if let Some(ns) = namespace {
        if !ns.is_empty() {
            parts.push(ns);
        }
    }
    parts.push(class);
    parts.join("::")
}
