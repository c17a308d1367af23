//! Phase registry: the fixed, totally ordered list of build stages.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

/// Names of the standard phases, in execution order.
pub mod phases {
    pub const VALIDATION: &str = "validation";
    pub const PREPARATION: &str = "preparation";
    pub const VOLUME_CREATION: &str = "volume_creation";
    pub const VOLUME_PREPARATION: &str = "volume_preparation";
    pub const VOLUME_MOUNTING: &str = "volume_mounting";
    pub const OS_INSTALLATION: &str = "os_installation";
    pub const PACKAGE_INSTALLATION: &str = "package_installation";
    pub const SYSTEM_MODIFICATION: &str = "system_modification";
    pub const USER_MODIFICATION: &str = "user_modification";
    pub const SYSTEM_CLEANING: &str = "system_cleaning";
    pub const VOLUME_UNMOUNTING: &str = "volume_unmounting";
    pub const IMAGE_REGISTRATION: &str = "image_registration";
    pub const CLEANING: &str = "cleaning";
}

const STANDARD_PHASES: &[(&str, &str, &str)] = &[
    (
        phases::VALIDATION,
        "Validation",
        "Validating data, files, etc.",
    ),
    (
        phases::PREPARATION,
        "Preparation",
        "Initializing connections, fetching data etc.",
    ),
    (
        phases::VOLUME_CREATION,
        "Volume creation",
        "Creating the volume to bootstrap onto",
    ),
    (
        phases::VOLUME_PREPARATION,
        "Volume preparation",
        "Formatting the bootstrap volume",
    ),
    (
        phases::VOLUME_MOUNTING,
        "Volume mounting",
        "Mounting bootstrap volume",
    ),
    (
        phases::OS_INSTALLATION,
        "OS installation",
        "Installing the operating system",
    ),
    (
        phases::PACKAGE_INSTALLATION,
        "Package installation",
        "Installing software",
    ),
    (
        phases::SYSTEM_MODIFICATION,
        "System modification",
        "Modifying configuration files, adding resources, etc.",
    ),
    (
        phases::USER_MODIFICATION,
        "User modification",
        "Running user specified modifications",
    ),
    (
        phases::SYSTEM_CLEANING,
        "System cleaning",
        "Removing sensitive data, temporary files and other leftovers",
    ),
    (
        phases::VOLUME_UNMOUNTING,
        "Volume unmounting",
        "Unmounting the bootstrap volume",
    ),
    (
        phases::IMAGE_REGISTRATION,
        "Image registration",
        "Uploading/Registering with the provider",
    ),
    (phases::CLEANING, "Cleaning", "Removing temporary files"),
];

/// A named build stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub title: String,
    pub description: String,
}

impl Phase {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Position of a phase in its registry. Lower ranks run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhaseRank(usize);

impl PhaseRank {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PhaseRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed, totally ordered catalog of phases.
///
/// Built once before any build starts; there is no way to mutate it afterwards.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    phases: Vec<Phase>,
    ranks: HashMap<String, PhaseRank>,
}

impl PhaseRegistry {
    /// Create a registry from phases listed in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`VmbuildError::Config`] if the list is empty or a name repeats.
    pub fn new(phases: Vec<Phase>) -> VmbuildResult<Self> {
        if phases.is_empty() {
            return Err(VmbuildError::Config(
                "phase registry must contain at least one phase".into(),
            ));
        }

        let mut ranks = HashMap::with_capacity(phases.len());
        for (i, phase) in phases.iter().enumerate() {
            if ranks.insert(phase.name.clone(), PhaseRank(i)).is_some() {
                return Err(VmbuildError::Config(format!(
                    "duplicate phase `{}` in registry",
                    phase.name
                )));
            }
        }

        Ok(Self { phases, ranks })
    }

    /// Registry with the standard image build phases.
    pub fn standard() -> Self {
        let phases = STANDARD_PHASES
            .iter()
            .map(|(name, title, description)| Phase::new(*name, *title, *description))
            .collect::<Vec<_>>();
        let ranks = phases
            .iter()
            .enumerate()
            .map(|(i, phase)| (phase.name.clone(), PhaseRank(i)))
            .collect();
        Self { phases, ranks }
    }

    /// Look up a phase's rank.
    ///
    /// # Errors
    ///
    /// Returns [`VmbuildError::Config`] for names the registry does not contain.
    pub fn rank(&self, name: &str) -> VmbuildResult<PhaseRank> {
        self.ranks
            .get(name)
            .copied()
            .ok_or_else(|| VmbuildError::Config(format!("unknown phase `{}`", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ranks.contains_key(name)
    }

    /// Compare two phases by position.
    pub fn compare(&self, a: &str, b: &str) -> VmbuildResult<Ordering> {
        Ok(self.rank(a)?.cmp(&self.rank(b)?))
    }

    pub fn get(&self, rank: PhaseRank) -> Option<&Phase> {
        self.phases.get(rank.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
