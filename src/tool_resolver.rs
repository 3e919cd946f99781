//! # Tool Discovery
//!
//! This module finds local optimizer executables:
//! - in the directories listed by the process `PATH`
//! - in the extra directories configured for the install (bundled binaries,
//!   content root, templates, assets)
//!
//! Discovery runs once and yields an immutable [`Capabilities`] map that is
//! passed into every chain run. A tool that cannot be found is not an error:
//! it simply has no path and the chain runner skips it.

use crate::config::Config;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One discovered local optimizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerCapability {
    pub name: String,
    /// Absolute path of the executable, `None` when not found
    pub path: Option<PathBuf>,
    pub options: Vec<String>,
}

impl OptimizerCapability {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// Capability map keyed by tool name
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    tools: BTreeMap<String, OptimizerCapability>,
    search_path: Vec<PathBuf>,
}

impl Capabilities {
    /// Builds a capability map from already-known entries
    pub fn from_tools(tools: impl IntoIterator<Item = OptimizerCapability>) -> Self {
        Self {
            tools: tools.into_iter().map(|tool| (tool.name.clone(), tool)).collect(),
            search_path: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptimizerCapability> {
        self.tools.get(name)
    }

    /// Available tools, in the order given by `names`
    pub fn available_in_order<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a OptimizerCapability> + 'a {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(|tool| tool.is_available())
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptimizerCapability> {
        self.tools.values()
    }

    /// Directories that were searched, in search order
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Get a report of tool availability
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("Search path:\n");
        for dir in &self.search_path {
            report.push_str(&format!("  {}\n", dir.display()));
        }
        report.push_str("\nOptimizers:\n");

        for tool in self.tools.values() {
            match &tool.path {
                Some(path) => report.push_str(&format!("  {:<10} {}\n", tool.name, path.display())),
                None if cfg!(target_os = "linux") => report.push_str(&format!(
                    "  {:<10} Not found (install with: {})\n",
                    tool.name,
                    linux_install_instructions(&tool.name)
                )),
                None => report.push_str(&format!("  {:<10} Not found\n", tool.name)),
            }
        }

        report
    }
}

/// Resolves tool names to executables
pub struct ToolDiscovery {
    extra_paths: Vec<PathBuf>,
    use_system_path: bool,
}

impl ToolDiscovery {
    /// Discovery over `PATH` plus `extra_paths`
    pub fn new(extra_paths: Vec<PathBuf>) -> Self {
        Self {
            extra_paths,
            use_system_path: true,
        }
    }

    /// Skips `PATH` entirely, only `extra_paths` are searched
    pub fn without_system_path(mut self) -> Self {
        self.use_system_path = false;
        self
    }

    /// Discovery over `PATH` plus the install and site directories of `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tool_search_dirs())
    }

    /// Runs discovery for every known tool with the options from `config`
    pub fn discover_from_config(config: &Config) -> Capabilities {
        let names: Vec<&str> = crate::config::KNOWN_TOOLS.to_vec();
        Self::from_config(config).discover(&names, &config.tool_options)
    }

    /// Resolves every name, attaching its option list
    pub fn discover(&self, names: &[&str], options: &BTreeMap<String, Vec<String>>) -> Capabilities {
        let search_path = self.search_path();
        debug!("Tool search path: {:?}", search_path);

        let tools = names
            .iter()
            .map(|name| {
                let path = Self::find_in(&search_path, name);
                match &path {
                    Some(found) => debug!("Resolved tool: {} -> {:?}", name, found),
                    None => warn!("Tool not found: {}", name),
                }
                OptimizerCapability {
                    name: name.to_string(),
                    path,
                    options: options.get(*name).cloned().unwrap_or_default(),
                }
            })
            .map(|tool| (tool.name.clone(), tool))
            .collect();

        Capabilities { tools, search_path }
    }

    /// System `PATH` entries followed by the extra directories, duplicates removed
    pub fn search_path(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if self.use_system_path {
            if let Some(path) = env::var_os("PATH") {
                dirs.extend(env::split_paths(&path).filter(|dir| !dir.as_os_str().is_empty()));
            }
        }
        for dir in &self.extra_paths {
            if dir.is_dir() {
                dirs.push(dir.canonicalize().unwrap_or_else(|_| dir.clone()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        dirs.retain(|dir| seen.insert(dir.clone()));
        dirs
    }

    fn find_in(dirs: &[PathBuf], tool_name: &str) -> Option<PathBuf> {
        let extension = if cfg!(windows) { ".exe" } else { "" };
        let tool_with_ext = format!("{}{}", tool_name, extension);

        dirs.iter()
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| is_executable(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Get installation instructions for a tool on Linux
fn linux_install_instructions(tool_name: &str) -> String {
    match tool_name {
        "jpegtran" => "sudo apt-get install libjpeg-progs".to_string(),
        "advpng" => "sudo apt-get install advancecomp".to_string(),
        "pngout" => "download from: http://www.jonof.id.au/kenutils".to_string(),
        _ => format!("sudo apt-get install {}", tool_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_discovers_tools_in_extra_paths() {
        let bin = TempDir::new().unwrap();
        let optipng = fake_tool(bin.path(), "optipng");

        let mut options = BTreeMap::new();
        options.insert("optipng".to_string(), vec!["-o2".to_string()]);

        let caps = ToolDiscovery::new(vec![bin.path().to_path_buf()])
            .without_system_path()
            .discover(&["optipng", "pngquant"], &options);

        let found = caps.get("optipng").unwrap();
        assert!(found.is_available());
        assert_eq!(found.path.as_deref().unwrap().file_name(), optipng.file_name());
        assert_eq!(found.options, vec!["-o2".to_string()]);

        let missing = caps.get("pngquant").unwrap();
        assert!(!missing.is_available());
        assert!(missing.options.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_files_are_skipped() {
        let bin = TempDir::new().unwrap();
        std::fs::write(bin.path().join("gifsicle"), "not a program").unwrap();

        let caps = ToolDiscovery::new(vec![bin.path().to_path_buf()])
            .without_system_path()
            .discover(&["gifsicle"], &BTreeMap::new());
        assert!(!caps.get("gifsicle").unwrap().is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_in_content_root_is_found() {
        let site = TempDir::new().unwrap();
        let files_root = site.path().join("site").join("assets").join("files");
        std::fs::create_dir_all(&files_root).unwrap();
        let jpegoptim = fake_tool(site.path(), "jpegoptim");

        let config = Config {
            files_root,
            ..Config::default()
        };
        let caps = ToolDiscovery::from_config(&config)
            .without_system_path()
            .discover(&["jpegoptim", "gifsicle"], &config.tool_options);

        let found = caps.get("jpegoptim").unwrap();
        assert_eq!(found.path.as_deref().unwrap().file_name(), jpegoptim.file_name());
        assert!(!found.options.is_empty());
        assert!(!caps.get("gifsicle").unwrap().is_available());
    }

    #[test]
    fn test_missing_extra_dirs_are_ignored() {
        let discovery = ToolDiscovery::new(vec![PathBuf::from("/definitely/not/here")]).without_system_path();
        assert!(discovery.search_path().is_empty());
    }

    #[test]
    fn test_available_in_order_follows_chain_order() {
        let caps = Capabilities::from_tools([
            OptimizerCapability { name: "a".into(), path: Some("/bin/a".into()), options: vec![] },
            OptimizerCapability { name: "b".into(), path: None, options: vec![] },
            OptimizerCapability { name: "c".into(), path: Some("/bin/c".into()), options: vec![] },
        ]);
        let chain = vec!["c".to_string(), "b".to_string(), "a".to_string(), "zzz".to_string()];
        let names: Vec<&str> = caps.available_in_order(&chain).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn test_report_lists_missing_tools() {
        let caps = Capabilities::from_tools([OptimizerCapability {
            name: "advpng".into(),
            path: None,
            options: vec![],
        }]);
        assert!(caps.report().contains("advpng"));
        assert!(caps.report().contains("Not found"));
    }
}
