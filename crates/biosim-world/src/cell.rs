//! A single terrain cell and its yearly process pipeline.

use crate::animal::Animal;
use biosim_core::{
    AnimalRecord, Error, ParameterRegistry, Result, Species, SpeciesCounts, Terrain, YearSummary,
};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Indices of the animals that want to leave a cell this year.
///
/// Indices point into the cell's species lists as they stand when the
/// pipeline returns, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationCandidates {
    pub herbivores: Vec<usize>,
    pub carnivores: Vec<usize>,
}

impl MigrationCandidates {
    pub fn get(&self, species: Species) -> &[usize] {
        match species {
            Species::Herbivore => &self.herbivores,
            Species::Carnivore => &self.carnivores,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.herbivores.is_empty() && self.carnivores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.herbivores.len() + self.carnivores.len()
    }
}

/// A cell of the island owning its local herbivore and carnivore populations
#[derive(Debug, Clone)]
pub struct Cell {
    terrain: Terrain,
    herbivores: Vec<Animal>,
    carnivores: Vec<Animal>,
    food: f64,
}

impl Cell {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            herbivores: Vec::new(),
            carnivores: Vec::new(),
            food: 0.0,
        }
    }

    pub fn terrain(&self) -> Terrain {
        self.terrain
    }

    pub fn is_passable(&self) -> bool {
        self.terrain.is_passable()
    }

    /// Fodder left for herbivores this year
    pub fn food(&self) -> f64 {
        self.food
    }

    pub fn herbivores(&self) -> &[Animal] {
        &self.herbivores
    }

    pub fn carnivores(&self) -> &[Animal] {
        &self.carnivores
    }

    pub fn animals(&self, species: Species) -> &[Animal] {
        match species {
            Species::Herbivore => &self.herbivores,
            Species::Carnivore => &self.carnivores,
        }
    }

    fn animals_mut(&mut self, species: Species) -> &mut Vec<Animal> {
        match species {
            Species::Herbivore => &mut self.herbivores,
            Species::Carnivore => &mut self.carnivores,
        }
    }

    pub fn counts(&self) -> SpeciesCounts {
        SpeciesCounts::new(self.herbivores.len(), self.carnivores.len())
    }

    pub fn is_empty(&self) -> bool {
        self.herbivores.is_empty() && self.carnivores.is_empty()
    }

    /// Check population records without inserting them
    pub fn validate_records(&self, records: &[AnimalRecord]) -> Result<()> {
        if !records.is_empty() && !self.is_passable() {
            return Err(Error::Validation(format!(
                "terrain {} cannot hold animals",
                self.terrain
            )));
        }
        for record in records {
            if !record.weight.is_finite() || record.weight < 0.0 {
                return Err(Error::Validation(format!(
                    "{} weight must be finite and non-negative, got {}",
                    record.species, record.weight
                )));
            }
        }
        Ok(())
    }

    /// Insert a batch of individuals; nothing is inserted if any record is invalid
    pub fn add_population(&mut self, records: &[AnimalRecord]) -> Result<()> {
        self.validate_records(records)?;
        for record in records {
            self.receive(Animal::from_record(record));
        }
        Ok(())
    }

    /// Take ownership of an animal, appending it to its species list
    pub fn receive(&mut self, animal: Animal) {
        self.animals_mut(animal.species).push(animal);
    }

    /// Remove and return the animals at `indices`, which must be ascending and unique
    pub fn take_animals(&mut self, species: Species, indices: &[usize]) -> Vec<Animal> {
        if indices.is_empty() {
            return Vec::new();
        }
        let list = self.animals_mut(species);
        let mut taken = Vec::with_capacity(indices.len());
        let mut kept = Vec::with_capacity(list.len());
        let mut wanted = indices.iter().copied().peekable();

        for (index, animal) in std::mem::take(list).into_iter().enumerate() {
            if wanted.peek() == Some(&index) {
                wanted.next();
                taken.push(animal);
            } else {
                kept.push(animal);
            }
        }
        *list = kept;
        taken
    }

    /// Run this year's local pipeline.
    ///
    /// Order: aging, death, weight loss, reproduction, regrowth, herbivore
    /// grazing, carnivore hunting, then migration-candidate selection. Cell
    /// membership is not changed by the returned candidates.
    pub fn run_year(
        &mut self,
        params: &ParameterRegistry,
        rng: &mut ChaCha8Rng,
    ) -> (YearSummary, MigrationCandidates) {
        let mut summary = YearSummary::default();

        self.age_animals();
        summary.deaths = self.remove_dead(params, rng);
        self.lose_weight(params);
        summary.births = self.reproduce(params, rng);
        self.regrow(params);
        self.feed_herbivores(params, rng);
        summary.herbivores_killed = self.feed_carnivores(params, rng);
        let candidates = self.migration_candidates(params, rng);

        trace!(
            terrain = %self.terrain,
            herbivores = self.herbivores.len(),
            carnivores = self.carnivores.len(),
            births = summary.births.total(),
            deaths = summary.deaths.total(),
            kills = summary.herbivores_killed,
            candidates = candidates.len(),
            "Cell pipeline finished"
        );

        (summary, candidates)
    }

    pub fn age_animals(&mut self) {
        for animal in self.herbivores.iter_mut().chain(self.carnivores.iter_mut()) {
            animal.grows_in_age();
        }
    }

    /// Draw death for every animal and drop the dead
    pub fn remove_dead(&mut self, params: &ParameterRegistry, rng: &mut ChaCha8Rng) -> SpeciesCounts {
        let before = self.counts();
        self.herbivores.retain(|animal| !animal.dies(&params.herbivore, rng));
        self.carnivores.retain(|animal| !animal.dies(&params.carnivore, rng));
        let after = self.counts();

        SpeciesCounts::new(
            before.herbivores - after.herbivores,
            before.carnivores - after.carnivores,
        )
    }

    pub fn lose_weight(&mut self, params: &ParameterRegistry) {
        for animal in &mut self.herbivores {
            animal.weight_lose(&params.herbivore);
        }
        for animal in &mut self.carnivores {
            animal.weight_lose(&params.carnivore);
        }
    }

    /// One birth attempt per existing animal; newborns join after the pass
    pub fn reproduce(&mut self, params: &ParameterRegistry, rng: &mut ChaCha8Rng) -> SpeciesCounts {
        let mut births = SpeciesCounts::default();
        for species in Species::all() {
            let species_params = params.species(species);
            let list = self.animals_mut(species);
            let n = list.len();
            if n < 2 {
                continue;
            }

            let newborns: Vec<Animal> = list
                .iter_mut()
                .filter_map(|parent| parent.baby(n, species_params, rng))
                .collect();

            match species {
                Species::Herbivore => births.herbivores = newborns.len(),
                Species::Carnivore => births.carnivores = newborns.len(),
            }
            list.extend(newborns);
        }
        births
    }

    /// Reset the fodder to the terrain's annual capacity
    pub fn regrow(&mut self, params: &ParameterRegistry) {
        self.food = params.f_max(self.terrain);
    }

    /// Herbivores graze in random order until the fodder runs out
    pub fn feed_herbivores(&mut self, params: &ParameterRegistry, rng: &mut ChaCha8Rng) {
        let herb_params = &params.herbivore;
        self.herbivores.shuffle(rng);

        for herbivore in &mut self.herbivores {
            if self.food <= 0.0 {
                break;
            }
            let portion = herb_params.appetite.min(self.food);
            herbivore.eat(portion, herb_params);
            self.food -= portion;
        }
    }

    /// Fittest carnivores hunt first, weakest herbivores are taken first.
    ///
    /// Returns the number of herbivores killed.
    pub fn feed_carnivores(&mut self, params: &ParameterRegistry, rng: &mut ChaCha8Rng) -> usize {
        if self.carnivores.is_empty() || self.herbivores.is_empty() {
            return 0;
        }
        let herb_params = &params.herbivore;
        let carn_params = &params.carnivore;

        self.herbivores
            .sort_by(|a, b| a.fitness(herb_params).total_cmp(&b.fitness(herb_params)));
        self.carnivores
            .sort_by(|a, b| b.fitness(carn_params).total_cmp(&a.fitness(carn_params)));

        let mut kills = 0;
        for carnivore in &mut self.carnivores {
            if self.herbivores.is_empty() {
                break;
            }
            let outcome = carnivore.predate(&mut self.herbivores, carn_params, herb_params, rng);
            if outcome.kills > 0 {
                trace!(
                    kills = outcome.kills,
                    eaten = outcome.eaten,
                    carnivore_weight = carnivore.weight,
                    "Carnivore fed"
                );
            }
            kills += outcome.kills;
        }
        kills
    }

    /// Draw the move propensity of every animal, herbivores first
    pub fn migration_candidates(
        &self,
        params: &ParameterRegistry,
        rng: &mut ChaCha8Rng,
    ) -> MigrationCandidates {
        let mut candidates = MigrationCandidates::default();
        for (index, animal) in self.herbivores.iter().enumerate() {
            if animal.wants_to_migrate(&params.herbivore, rng) {
                candidates.herbivores.push(index);
            }
        }
        for (index, animal) in self.carnivores.iter().enumerate() {
            if animal.wants_to_migrate(&params.carnivore, rng) {
                candidates.carnivores.push(index);
            }
        }
        candidates
    }
}
