//! Population statistics handed to observers.

use crate::config::{HistogramSpec, HistogramSpecs};
use crate::types::Species;
use serde::{Deserialize, Serialize};

/// Number of live animals per species
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCounts {
    pub herbivores: usize,
    pub carnivores: usize,
}

impl SpeciesCounts {
    pub fn new(herbivores: usize, carnivores: usize) -> Self {
        Self {
            herbivores,
            carnivores,
        }
    }

    pub fn get(&self, species: Species) -> usize {
        match species {
            Species::Herbivore => self.herbivores,
            Species::Carnivore => self.carnivores,
        }
    }

    pub fn total(&self) -> usize {
        self.herbivores + self.carnivores
    }
}

impl std::ops::Add for SpeciesCounts {
    type Output = SpeciesCounts;

    fn add(self, other: SpeciesCounts) -> SpeciesCounts {
        SpeciesCounts::new(
            self.herbivores + other.herbivores,
            self.carnivores + other.carnivores,
        )
    }
}

impl std::iter::Sum for SpeciesCounts {
    fn sum<I: Iterator<Item = SpeciesCounts>>(iter: I) -> Self {
        iter.fold(SpeciesCounts::default(), |acc, c| acc + c)
    }
}

/// Per-cell species counts for density maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCount {
    pub row: usize,
    pub col: usize,
    pub herbivores: usize,
    pub carnivores: usize,
}

/// Raw age, weight and fitness values of one species
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitSamples {
    pub age: Vec<f64>,
    pub weight: Vec<f64>,
    pub fitness: Vec<f64>,
}

impl TraitSamples {
    pub fn push(&mut self, age: u32, weight: f64, fitness: f64) {
        self.age.push(age as f64);
        self.weight.push(weight);
        self.fitness.push(fitness);
    }

    pub fn len(&self) -> usize {
        self.age.len()
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_empty()
    }

    pub fn mean_weight(&self) -> f64 {
        mean(&self.weight)
    }

    pub fn mean_fitness(&self) -> f64 {
        mean(&self.fitness)
    }

    pub fn mean_age(&self) -> f64 {
        mean(&self.age)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Trait samples for both species
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distributions {
    pub herbivore: TraitSamples,
    pub carnivore: TraitSamples,
}

impl Distributions {
    pub fn species(&self, species: Species) -> &TraitSamples {
        match species {
            Species::Herbivore => &self.herbivore,
            Species::Carnivore => &self.carnivore,
        }
    }

    pub fn species_mut(&mut self, species: Species) -> &mut TraitSamples {
        match species {
            Species::Herbivore => &mut self.herbivore,
            Species::Carnivore => &mut self.carnivore,
        }
    }
}

/// Fixed-width histogram over `[0, max)`; values at or above `max` land in the last bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub delta: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn from_values(values: &[f64], spec: &HistogramSpec) -> Self {
        let num_bins = spec.num_bins();
        let mut counts = vec![0; num_bins];
        for &value in values {
            let bin = (value.max(0.0) / spec.delta).floor() as usize;
            counts[bin.min(num_bins - 1)] += 1;
        }
        Self {
            delta: spec.delta,
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Lower edge of every bin
    pub fn edges(&self) -> Vec<f64> {
        (0..self.counts.len())
            .map(|i| i as f64 * self.delta)
            .collect()
    }
}

/// Age, weight and fitness histograms of one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitHistograms {
    pub age: Histogram,
    pub weight: Histogram,
    pub fitness: Histogram,
}

impl TraitHistograms {
    pub fn from_samples(samples: &TraitSamples, specs: &HistogramSpecs) -> Self {
        Self {
            age: Histogram::from_values(&samples.age, &specs.age),
            weight: Histogram::from_values(&samples.weight, &specs.weight),
            fitness: Histogram::from_values(&samples.fitness, &specs.fitness),
        }
    }
}

/// Trait histograms for both species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesHistograms {
    pub herbivore: TraitHistograms,
    pub carnivore: TraitHistograms,
}

impl SpeciesHistograms {
    pub fn from_distributions(distributions: &Distributions, specs: &HistogramSpecs) -> Self {
        Self {
            herbivore: TraitHistograms::from_samples(&distributions.herbivore, specs),
            carnivore: TraitHistograms::from_samples(&distributions.carnivore, specs),
        }
    }
}

/// Outcome counters of one simulated year
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub births: SpeciesCounts,
    pub deaths: SpeciesCounts,
    pub herbivores_killed: usize,
    pub migrations: SpeciesCounts,
    pub blocked_migrations: SpeciesCounts,
}

impl YearSummary {
    pub fn merge(&mut self, other: &YearSummary) {
        self.births = self.births + other.births;
        self.deaths = self.deaths + other.deaths;
        self.herbivores_killed += other.herbivores_killed;
        self.migrations = self.migrations + other.migrations;
        self.blocked_migrations = self.blocked_migrations + other.blocked_migrations;
    }
}

/// Counters accumulated over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeTotals {
    pub years: u32,
    pub totals: YearSummary,
}

impl LifetimeTotals {
    pub fn record(&mut self, summary: &YearSummary) {
        self.years += 1;
        self.totals.merge(summary);
    }
}
