//! Environment registry.
//!
//! An environment is a named set of infrastructure bindings: the
//! application VM, the logical-to-physical database map, and the load
//! balancer currently fronting it. The registry is a YAML file in the data
//! directory; jobs validate environment names against it before running
//! and tasks update it as they create or destroy resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CutoverError, Result};

/// One managed environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentModel {
    pub name: String,

    /// Application VM instance id, if one is launched.
    pub vm_instance: Option<String>,

    /// Logical database name to physical instance id.
    #[serde(default)]
    pub databases: BTreeMap<String, String>,

    /// Load balancer this environment's VM is registered with.
    pub load_balancer: Option<String>,
}

impl EnvironmentModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    environments: BTreeMap<String, EnvironmentModel>,
}

/// YAML-backed registry of environments.
#[derive(Debug)]
pub struct EnvironmentStore {
    path: PathBuf,
    environments: BTreeMap<String, EnvironmentModel>,
}

impl EnvironmentStore {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    const FILE_NAME: &'static str = "environments.yml";

    /// Load the registry from the data directory, or start empty.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(Self::FILE_NAME);

        if !path.exists() {
            return Ok(Self {
                path,
                environments: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let file: RegistryFile =
            serde_yaml::from_str(&content).map_err(|e| CutoverError::ConfigParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            path,
            environments: file.environments,
        })
    }

    /// Save the registry using atomic write-to-temp-then-rename.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = RegistryFile {
            version: Self::CURRENT_VERSION,
            environments: self.environments.clone(),
        };
        let content =
            serde_yaml::to_string(&file).map_err(|e| CutoverError::ConfigParseError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let temp_path = self.path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// Checks that all the given environment names exist. Errors on the
    /// first one that does not.
    pub fn verify_exists(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.exists(name) {
                return Err(CutoverError::UnknownEnvironment {
                    name: (*name).to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EnvironmentModel> {
        self.environments.get(name)
    }

    /// Fetch an environment or error. For envs a job requires to exist.
    pub fn require(&self, name: &str) -> Result<&EnvironmentModel> {
        self.get(name)
            .ok_or_else(|| CutoverError::UnknownEnvironment {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &EnvironmentModel> {
        self.environments.values()
    }

    /// Insert or replace an environment and persist the registry.
    pub fn put(&mut self, env: EnvironmentModel) -> Result<()> {
        self.environments.insert(env.name.clone(), env);
        self.save()
    }

    /// Apply a mutation to an environment (creating it if absent) and
    /// persist the registry.
    pub fn update<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut EnvironmentModel),
    {
        let env = self
            .environments
            .entry(name.to_string())
            .or_insert_with(|| EnvironmentModel::new(name));
        f(env);
        self.save()
    }

    /// Remove an environment and persist the registry. Removing an unknown
    /// name is not an error.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.environments.remove(name);
        self.save()
    }
}
