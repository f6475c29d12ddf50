//! Individual animal state and biology.

use biosim_core::{AnimalRecord, SpeciesParams, Species};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A single herbivore or carnivore.
///
/// Behaviour is selected by `species`; the numeric rules come from the
/// [`SpeciesParams`] passed into each call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub species: Species,
    pub age: u32,
    pub weight: f64,
}

/// Result of one carnivore feeding event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Predation {
    /// Herbivores killed and removed from the list
    pub kills: usize,
    /// Herbivore biomass consumed, never above the appetite
    pub eaten: f64,
}

impl Animal {
    pub fn new(species: Species, age: u32, weight: f64) -> Self {
        Self {
            species,
            age,
            weight,
        }
    }

    /// Age 0 with a birth weight drawn from the species' normal distribution
    pub fn newborn(species: Species, params: &SpeciesParams, rng: &mut ChaCha8Rng) -> Self {
        let weight = sample_birth_weight(params, rng);
        Self::new(species, 0, weight)
    }

    pub fn from_record(record: &AnimalRecord) -> Self {
        Self::new(record.species, record.age, record.weight)
    }

    /// Φ = q⁺(age) · q⁻(weight), exactly 0 for a weightless animal
    pub fn fitness(&self, params: &SpeciesParams) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let q_plus = 1.0 / (1.0 + (params.phi_age * (self.age as f64 - params.a_half)).exp());
        let q_minus = 1.0 / (1.0 + (-params.phi_weight * (self.weight - params.w_half)).exp());
        q_plus * q_minus
    }

    pub fn grows_in_age(&mut self) {
        self.age += 1;
    }

    pub fn weight_lose(&mut self, params: &SpeciesParams) {
        self.weight *= 1.0 - params.eta;
    }

    /// Gain `beta * amount`; the caller decides how much food is on offer
    pub fn eat(&mut self, amount: f64, params: &SpeciesParams) {
        self.weight += params.beta * amount;
    }

    /// One reproduction attempt among `n` animals of the same species in the cell.
    ///
    /// Returns the newborn if one was born; the parent pays `xi` times the
    /// newborn's weight.
    pub fn baby(&mut self, n: usize, params: &SpeciesParams, rng: &mut ChaCha8Rng) -> Option<Animal> {
        if n < 2 {
            return None;
        }
        let probability = (params.gamma * self.fitness(params) * (n - 1) as f64).min(1.0);
        let roll = rng.gen::<f64>();

        if self.weight < params.birth_threshold() || roll >= probability {
            return None;
        }

        let newborn = Animal::newborn(self.species, params, rng);
        let cost = params.xi * newborn.weight;
        if cost >= self.weight {
            return None;
        }
        self.weight -= cost;
        Some(newborn)
    }

    /// Certain for a weightless animal, otherwise drawn with probability `omega * (1 - Φ)`
    pub fn dies(&self, params: &SpeciesParams, rng: &mut ChaCha8Rng) -> bool {
        if self.weight <= 0.0 {
            return true;
        }
        let probability = params.omega * (1.0 - self.fitness(params));
        rng.gen::<f64>() < probability
    }

    /// Whether the animal tries to migrate this year, probability `mu * Φ`
    pub fn wants_to_migrate(&self, params: &SpeciesParams, rng: &mut ChaCha8Rng) -> bool {
        let probability = params.mu * self.fitness(params);
        rng.gen::<f64>() < probability
    }

    /// Chance of killing a herbivore of fitness `prey_fitness`
    pub fn kill_probability(&self, prey_fitness: f64, params: &SpeciesParams) -> f64 {
        let own_fitness = self.fitness(params);
        let difference = own_fitness - prey_fitness;
        if own_fitness <= prey_fitness {
            return 0.0;
        }
        match params.delta_phi_max {
            Some(delta_phi_max) if difference < delta_phi_max => difference / delta_phi_max,
            _ => 1.0,
        }
    }

    /// Hunt through `herbivores`, which must be sorted from least to most fit.
    ///
    /// Stops at the first herbivore at least as fit as the carnivore or once
    /// the appetite is met. Killed herbivores are removed from the list.
    pub fn predate(
        &mut self,
        herbivores: &mut Vec<Animal>,
        params: &SpeciesParams,
        prey_params: &SpeciesParams,
        rng: &mut ChaCha8Rng,
    ) -> Predation {
        let mut outcome = Predation::default();
        let mut killed = vec![false; herbivores.len()];

        for (index, herbivore) in herbivores.iter().enumerate() {
            if outcome.eaten >= params.appetite {
                break;
            }
            let prey_fitness = herbivore.fitness(prey_params);
            if prey_fitness >= self.fitness(params) {
                break;
            }

            let probability = self.kill_probability(prey_fitness, params);
            if rng.gen::<f64>() < probability {
                let portion = herbivore.weight.min(params.appetite - outcome.eaten);
                self.eat(portion, params);
                outcome.eaten += portion;
                outcome.kills += 1;
                killed[index] = true;
            }
        }

        if outcome.kills > 0 {
            let mut flags = killed.into_iter();
            herbivores.retain(|_| !flags.next().unwrap_or(false));
        }
        outcome
    }
}

/// Normal draw via Box-Muller, clamped so a newborn never has negative weight
fn sample_birth_weight(params: &SpeciesParams, rng: &mut ChaCha8Rng) -> f64 {
    let u1 = rng.gen::<f64>().max(f64::EPSILON);
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    (params.w_birth + params.sigma_birth * z).max(0.0)
}
