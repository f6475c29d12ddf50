//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::types::{AnimalRecord, Location, PopulationEntry, Species, Terrain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Key/value parameter overrides, keyed by parameter name (`w_birth`, `F`, `DeltaPhiMax`, ...)
pub type ParameterOverrides = BTreeMap<String, f64>;

fn check_value(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidParameterValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

/// Biological constants of one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    pub w_birth: f64,
    pub sigma_birth: f64,
    pub beta: f64,
    pub eta: f64,
    pub a_half: f64,
    pub phi_age: f64,
    pub w_half: f64,
    pub phi_weight: f64,
    pub mu: f64,
    pub gamma: f64,
    pub zeta: f64,
    pub xi: f64,
    pub omega: f64,
    /// Most food eaten in one year
    #[serde(rename = "F")]
    pub appetite: f64,
    /// Carnivores only
    #[serde(rename = "DeltaPhiMax", default, skip_serializing_if = "Option::is_none")]
    pub delta_phi_max: Option<f64>,
}

impl SpeciesParams {
    pub fn herbivore() -> Self {
        Self {
            w_birth: 8.0,
            sigma_birth: 1.5,
            beta: 0.9,
            eta: 0.05,
            a_half: 40.0,
            phi_age: 0.6,
            w_half: 10.0,
            phi_weight: 0.1,
            mu: 0.25,
            gamma: 0.2,
            zeta: 3.5,
            xi: 1.2,
            omega: 0.4,
            appetite: 10.0,
            delta_phi_max: None,
        }
    }

    pub fn carnivore() -> Self {
        Self {
            w_birth: 6.0,
            sigma_birth: 1.0,
            beta: 0.75,
            eta: 0.125,
            a_half: 40.0,
            phi_age: 0.3,
            w_half: 4.0,
            phi_weight: 0.4,
            mu: 0.4,
            gamma: 0.8,
            zeta: 3.5,
            xi: 1.1,
            omega: 0.8,
            appetite: 50.0,
            delta_phi_max: Some(10.0),
        }
    }

    pub fn for_species(species: Species) -> Self {
        match species {
            Species::Herbivore => Self::herbivore(),
            Species::Carnivore => Self::carnivore(),
        }
    }

    /// Lowest weight at which an animal may give birth
    pub fn birth_threshold(&self) -> f64 {
        self.zeta * (self.w_birth + self.sigma_birth)
    }

    /// Current value of a named parameter
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "w_birth" => Some(self.w_birth),
            "sigma_birth" => Some(self.sigma_birth),
            "beta" => Some(self.beta),
            "eta" => Some(self.eta),
            "a_half" => Some(self.a_half),
            "phi_age" => Some(self.phi_age),
            "w_half" => Some(self.w_half),
            "phi_weight" => Some(self.phi_weight),
            "mu" => Some(self.mu),
            "gamma" => Some(self.gamma),
            "zeta" => Some(self.zeta),
            "xi" => Some(self.xi),
            "omega" => Some(self.omega),
            "F" => Some(self.appetite),
            "DeltaPhiMax" => self.delta_phi_max,
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "w_birth" => Some(&mut self.w_birth),
            "sigma_birth" => Some(&mut self.sigma_birth),
            "beta" => Some(&mut self.beta),
            "eta" => Some(&mut self.eta),
            "a_half" => Some(&mut self.a_half),
            "phi_age" => Some(&mut self.phi_age),
            "w_half" => Some(&mut self.w_half),
            "phi_weight" => Some(&mut self.phi_weight),
            "mu" => Some(&mut self.mu),
            "gamma" => Some(&mut self.gamma),
            "zeta" => Some(&mut self.zeta),
            "xi" => Some(&mut self.xi),
            "omega" => Some(&mut self.omega),
            "F" => Some(&mut self.appetite),
            "DeltaPhiMax" => self.delta_phi_max.as_mut(),
            _ => None,
        }
    }

    /// Validate every override and apply them together.
    ///
    /// Unknown names fail with [`Error::InvalidParameterName`], negative or
    /// non-finite values with [`Error::InvalidParameterValue`]. On failure
    /// `self` is left untouched.
    pub fn apply_overrides(&mut self, overrides: &ParameterOverrides) -> Result<()> {
        let mut updated = self.clone();
        for (name, &value) in overrides {
            let slot = updated
                .field_mut(name)
                .ok_or_else(|| Error::InvalidParameterName(name.clone()))?;
            check_value(name, value)?;
            *slot = value;
        }
        *self = updated;
        Ok(())
    }
}

/// Food capacity of a tunable terrain type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainParams {
    pub f_max: f64,
}

impl TerrainParams {
    pub fn new(f_max: f64) -> Self {
        Self { f_max }
    }

    pub fn apply_overrides(&mut self, overrides: &ParameterOverrides) -> Result<()> {
        let mut updated = self.clone();
        for (name, &value) in overrides {
            match name.as_str() {
                "f_max" => {
                    check_value(name, value)?;
                    updated.f_max = value;
                }
                _ => return Err(Error::InvalidParameterName(name.clone())),
            }
        }
        *self = updated;
        Ok(())
    }
}

/// All model parameters for one simulation run.
///
/// Owned by the driver and lent to every cell for the yearly pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRegistry {
    pub herbivore: SpeciesParams,
    pub carnivore: SpeciesParams,
    pub highland: TerrainParams,
    pub lowland: TerrainParams,
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self {
            herbivore: SpeciesParams::herbivore(),
            carnivore: SpeciesParams::carnivore(),
            highland: TerrainParams::new(300.0),
            lowland: TerrainParams::new(800.0),
        }
    }
}

impl ParameterRegistry {
    pub fn species(&self, species: Species) -> &SpeciesParams {
        match species {
            Species::Herbivore => &self.herbivore,
            Species::Carnivore => &self.carnivore,
        }
    }

    /// Annual herbivore food capacity of a terrain
    pub fn f_max(&self, terrain: Terrain) -> f64 {
        match terrain {
            Terrain::Water | Terrain::Desert => 0.0,
            Terrain::Highland => self.highland.f_max,
            Terrain::Lowland => self.lowland.f_max,
        }
    }

    pub fn set_animal_parameters(
        &mut self,
        species: Species,
        overrides: &ParameterOverrides,
    ) -> Result<()> {
        let params = match species {
            Species::Herbivore => &mut self.herbivore,
            Species::Carnivore => &mut self.carnivore,
        };
        params.apply_overrides(overrides)?;
        tracing::debug!(
            event = "animal_parameters_updated",
            species = %species,
            keys = ?overrides.keys().collect::<Vec<_>>(),
            "Animal parameters updated"
        );
        Ok(())
    }

    /// Water and desert carry no tunable parameters, so any key is rejected for them.
    pub fn set_landscape_parameters(
        &mut self,
        terrain: Terrain,
        overrides: &ParameterOverrides,
    ) -> Result<()> {
        match terrain {
            Terrain::Highland => self.highland.apply_overrides(overrides)?,
            Terrain::Lowland => self.lowland.apply_overrides(overrides)?,
            Terrain::Water | Terrain::Desert => {
                if let Some(name) = overrides.keys().next() {
                    return Err(Error::InvalidParameterName(name.clone()));
                }
            }
        }
        tracing::debug!(
            event = "landscape_parameters_updated",
            terrain = %terrain,
            keys = ?overrides.keys().collect::<Vec<_>>(),
            "Landscape parameters updated"
        );
        Ok(())
    }
}

/// Largest number of bins a histogram may have
pub const MAX_HISTOGRAM_BINS: usize = 100_000;

/// Bin layout for one histogram property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSpec {
    pub max: f64,
    pub delta: f64,
}

impl HistogramSpec {
    pub fn new(max: f64, delta: f64) -> Self {
        Self { max, delta }
    }

    pub fn validate(&self, property: &str) -> Result<()> {
        if !(self.max.is_finite() && self.max > 0.0 && self.delta.is_finite() && self.delta > 0.0) {
            return Err(Error::Validation(format!(
                "histogram spec for {} needs positive max and delta, got max={} delta={}",
                property, self.max, self.delta
            )));
        }
        if self.max / self.delta > MAX_HISTOGRAM_BINS as f64 {
            return Err(Error::Validation(format!(
                "histogram spec for {} needs at most {} bins, got max={} delta={}",
                property, MAX_HISTOGRAM_BINS, self.max, self.delta
            )));
        }
        Ok(())
    }

    pub fn num_bins(&self) -> usize {
        (self.max / self.delta).ceil().max(1.0) as usize
    }
}

/// Histogram layouts for the three observed properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramSpecs {
    pub weight: HistogramSpec,
    pub fitness: HistogramSpec,
    pub age: HistogramSpec,
}

impl Default for HistogramSpecs {
    fn default() -> Self {
        Self {
            weight: HistogramSpec::new(60.0, 2.0),
            fitness: HistogramSpec::new(1.0, 0.05),
            age: HistogramSpec::new(60.0, 2.0),
        }
    }
}

impl HistogramSpecs {
    pub fn validate(&self) -> Result<()> {
        self.weight.validate("weight")?;
        self.fitness.validate("fitness")?;
        self.age.validate("age")
    }
}

/// Population added once the simulation has reached a given year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPopulation {
    pub year: u32,
    pub population: Vec<PopulationEntry>,
}

/// Scenario configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub island_map: String,
    pub initial_population: Vec<PopulationEntry>,
    /// Animals placed later in the run
    pub scheduled_population: Vec<ScheduledPopulation>,
    pub animal_parameters: BTreeMap<Species, ParameterOverrides>,
    pub landscape_parameters: BTreeMap<Terrain, ParameterOverrides>,
    pub hist_specs: HistogramSpecs,
    /// Years between population log snapshots
    pub log_interval: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 123_456,
            island_map: DEFAULT_ISLAND_MAP.to_string(),
            initial_population: Vec::new(),
            scheduled_population: Vec::new(),
            animal_parameters: BTreeMap::new(),
            landscape_parameters: BTreeMap::new(),
            hist_specs: HistogramSpecs::default(),
            log_interval: 10,
        }
    }
}

impl SimConfig {
    /// Default island with 150 herbivores, joined by 40 carnivores after 50 years
    pub fn demo() -> Self {
        let herbivores = (0..150)
            .map(|_| AnimalRecord::new(Species::Herbivore, 5, 20.0))
            .collect();
        let carnivores = (0..40)
            .map(|_| AnimalRecord::new(Species::Carnivore, 5, 20.0))
            .collect();

        Self {
            initial_population: vec![PopulationEntry::new(Location::new(10, 10), herbivores)],
            scheduled_population: vec![ScheduledPopulation {
                year: 50,
                population: vec![PopulationEntry::new(Location::new(10, 10), carnivores)],
            }],
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build the parameter registry with all overrides of this scenario applied
    pub fn parameter_registry(&self) -> Result<ParameterRegistry> {
        let mut registry = ParameterRegistry::default();
        for (&species, overrides) in &self.animal_parameters {
            registry.set_animal_parameters(species, overrides)?;
        }
        for (&terrain, overrides) in &self.landscape_parameters {
            registry.set_landscape_parameters(terrain, overrides)?;
        }
        Ok(registry)
    }
}

pub const DEFAULT_ISLAND_MAP: &str = "\
WWWWWWWWWWWWWWWWWWWWW
WWWWWWWWHWWWWLLLLLLLW
WHHHHHLLLLWWLLLLLLLWW
WHHHHHHHHHWWLLLLLLWWW
WHHHHHLLLLLLLLLLLLWWW
WHHHHHLLLDDLLLHLLLWWW
WHHLLLLLDDDLLLHHHHWWW
WWHHHHLLLDDLLLHWWWWWW
WHHHLLLLLDDLLLLLLLWWW
WHHHHLLLLDDLLLLWWWWWW
WWHHHHLLLLLLLLWWWWWWW
WWWHHHHLLLLLLLWWWWWWW
WWWWWWWWWWWWWWWWWWWWW";
