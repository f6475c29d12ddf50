//! Simulation driver: owns the island, the parameters and the random stream.

use crate::island::Island;
use biosim_core::{
    CellCount, Distributions, Error, HistogramSpecs, LifetimeTotals, ParameterOverrides,
    ParameterRegistry, PopulationEntry, Result, SimConfig, Species, SpeciesCounts,
    SpeciesHistograms, Terrain, YearSummary,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, event, info, instrument, Level};

/// State handed to observers between years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub year: u32,
    pub counts: SpeciesCounts,
    pub cells: Vec<CellCount>,
    pub histograms: SpeciesHistograms,
}

/// Receives a snapshot at the cadence requested by [`Simulation::simulate_observed`]
pub trait SimulationObserver {
    fn observe(&mut self, snapshot: &Snapshot);
}

impl<F: FnMut(&Snapshot)> SimulationObserver for F {
    fn observe(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

pub struct Simulation {
    island: Island,
    params: ParameterRegistry,
    rng: ChaCha8Rng,
    year: u32,
    hist_specs: HistogramSpecs,
    log_interval: u32,
    totals: LifetimeTotals,
    last_summary: YearSummary,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.hist_specs.validate()?;
        let params = config.parameter_registry()?;
        let mut island = Island::from_map(&config.island_map)?;
        island.add_population(&config.initial_population)?;

        info!(
            event = "simulation_created",
            seed = config.seed,
            rows = island.rows(),
            cols = island.cols(),
            herbivores = island.counts().herbivores,
            carnivores = island.counts().carnivores,
            "Simulation created"
        );

        Ok(Self {
            island,
            params,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            year: 0,
            hist_specs: config.hist_specs,
            log_interval: config.log_interval,
            totals: LifetimeTotals::default(),
            last_summary: YearSummary::default(),
        })
    }

    pub fn set_animal_parameters(
        &mut self,
        species: Species,
        overrides: &ParameterOverrides,
    ) -> Result<()> {
        self.params.set_animal_parameters(species, overrides)
    }

    pub fn set_landscape_parameters(
        &mut self,
        terrain: Terrain,
        overrides: &ParameterOverrides,
    ) -> Result<()> {
        self.params.set_landscape_parameters(terrain, overrides)
    }

    /// Place more animals; nothing is added if any entry is rejected
    pub fn add_population(&mut self, entries: &[PopulationEntry]) -> Result<()> {
        self.island.add_population(entries)?;
        let added: usize = entries.iter().map(|e| e.individuals.len()).sum();
        info!(
            event = "population_added",
            year = self.year,
            added,
            total = self.num_animals(),
            "Population added"
        );
        Ok(())
    }

    /// Advance one year
    pub fn step(&mut self) -> YearSummary {
        let summary = self.island.annual_cycle(&self.params, &mut self.rng);
        self.year += 1;
        self.totals.record(&summary);
        self.last_summary = summary;

        let counts = self.num_animals_per_species();
        debug!(
            event = "year_completed",
            year = self.year,
            herbivores = counts.herbivores,
            carnivores = counts.carnivores,
            births = summary.births.total(),
            deaths = summary.deaths.total(),
            herbivores_killed = summary.herbivores_killed,
            migrations = summary.migrations.total(),
            blocked_migrations = summary.blocked_migrations.total(),
            "Year completed"
        );

        if self.log_interval > 0 && self.year % self.log_interval == 0 {
            self.emit_population_metrics(counts);
        }

        summary
    }

    /// Run `num_years` years, continuing from the current year
    #[instrument(skip(self), fields(start_year = self.year))]
    pub fn simulate(&mut self, num_years: u32) {
        info!(
            event = "simulation_started",
            num_years,
            "Starting simulation for {} years",
            num_years
        );
        for _ in 0..num_years {
            self.step();
        }
        self.emit_run_summary();
    }

    /// Like [`simulate`](Self::simulate), but hands a snapshot to `observer`
    /// before the first year and after every year that is a multiple of
    /// `vis_years`, counted from year 0.
    #[instrument(skip(self, observer), fields(start_year = self.year))]
    pub fn simulate_observed(
        &mut self,
        num_years: u32,
        vis_years: u32,
        observer: &mut dyn SimulationObserver,
    ) -> Result<()> {
        if vis_years == 0 {
            return Err(Error::Validation(
                "vis_years must be at least 1".to_string(),
            ));
        }
        info!(
            event = "simulation_started",
            num_years,
            vis_years,
            "Starting simulation for {} years",
            num_years
        );

        observer.observe(&self.snapshot());
        for _ in 0..num_years {
            self.step();
            if self.year % vis_years == 0 {
                observer.observe(&self.snapshot());
            }
        }
        self.emit_run_summary();
        Ok(())
    }

    fn emit_population_metrics(&self, counts: SpeciesCounts) {
        let distributions = self.distributions();
        info!(
            event = "population_snapshot",
            year = self.year,
            herbivores = counts.herbivores,
            carnivores = counts.carnivores,
            herbivore_mean_weight = format!("{:.2}", distributions.herbivore.mean_weight()),
            carnivore_mean_weight = format!("{:.2}", distributions.carnivore.mean_weight()),
            herbivore_mean_fitness = format!("{:.3}", distributions.herbivore.mean_fitness()),
            carnivore_mean_fitness = format!("{:.3}", distributions.carnivore.mean_fitness()),
            "Year {}: {} herbivores, {} carnivores",
            self.year,
            counts.herbivores,
            counts.carnivores
        );

        event!(
            Level::INFO,
            gauge_name = "herbivore_population",
            gauge_value = counts.herbivores,
            year = self.year,
            "Herbivore population gauge"
        );
        event!(
            Level::INFO,
            gauge_name = "carnivore_population",
            gauge_value = counts.carnivores,
            year = self.year,
            "Carnivore population gauge"
        );
    }

    fn emit_run_summary(&self) {
        let counts = self.num_animals_per_species();
        let totals = &self.totals.totals;
        info!(
            event = "simulation_finished",
            year = self.year,
            herbivores = counts.herbivores,
            carnivores = counts.carnivores,
            years_simulated = self.totals.years,
            herbivore_births = totals.births.herbivores,
            carnivore_births = totals.births.carnivores,
            herbivore_deaths = totals.deaths.herbivores,
            carnivore_deaths = totals.deaths.carnivores,
            herbivores_killed = totals.herbivores_killed,
            migrations = totals.migrations.total(),
            blocked_migrations = totals.blocked_migrations.total(),
            "Simulation finished"
        );

        event!(
            Level::INFO,
            counter_name = "herbivores_killed_total",
            counter_value = totals.herbivores_killed,
            "Predation counter"
        );
        event!(
            Level::INFO,
            gauge_name = "final_population",
            gauge_value = counts.total(),
            "Final population gauge"
        );
    }

    /// Number of years simulated so far
    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn num_animals(&self) -> usize {
        self.island.counts().total()
    }

    pub fn num_animals_per_species(&self) -> SpeciesCounts {
        self.island.counts()
    }

    pub fn cell_counts(&self) -> Vec<CellCount> {
        self.island.cell_counts()
    }

    pub fn distributions(&self) -> Distributions {
        self.island.distributions(&self.params)
    }

    pub fn histograms(&self) -> SpeciesHistograms {
        SpeciesHistograms::from_distributions(&self.distributions(), &self.hist_specs)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            year: self.year,
            counts: self.num_animals_per_species(),
            cells: self.cell_counts(),
            histograms: self.histograms(),
        }
    }

    pub fn last_summary(&self) -> &YearSummary {
        &self.last_summary
    }

    pub fn totals(&self) -> &LifetimeTotals {
        &self.totals
    }

    pub fn island(&self) -> &Island {
        &self.island
    }

    pub fn params(&self) -> &ParameterRegistry {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_core::{AnimalRecord, Location};

    fn lone_lowland_config(seed: u64) -> SimConfig {
        let herbivores = (0..150)
            .map(|_| AnimalRecord::new(Species::Herbivore, 5, 20.0))
            .collect();
        SimConfig {
            seed,
            island_map: "WWW\nWLW\nWWW".to_string(),
            initial_population: vec![PopulationEntry::new(Location::new(2, 2), herbivores)],
            ..SimConfig::default()
        }
    }

    fn carnivores(count: usize) -> Vec<PopulationEntry> {
        vec![PopulationEntry::new(
            Location::new(2, 2),
            (0..count)
                .map(|_| AnimalRecord::new(Species::Carnivore, 5, 20.0))
                .collect(),
        )]
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::new(lone_lowland_config(1)).unwrap();
        assert_eq!(sim.year(), 0);
        assert_eq!(sim.num_animals(), 150);
        assert_eq!(sim.num_animals_per_species(), SpeciesCounts::new(150, 0));
        assert_eq!(sim.cell_counts().len(), 9);
    }

    #[test]
    fn test_default_scenarios_build() {
        let sim = Simulation::new(SimConfig::default()).unwrap();
        assert_eq!(sim.num_animals(), 0);

        let sim = Simulation::new(SimConfig::demo()).unwrap();
        assert_eq!(sim.num_animals_per_species(), SpeciesCounts::new(150, 0));
        assert_eq!(sim.island().rows(), 13);
        assert_eq!(sim.island().cols(), 21);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = lone_lowland_config(1);
        config.island_map = "WWW\nWLL\nWWW".to_string();
        assert!(matches!(Simulation::new(config), Err(Error::OpenBoundary { .. })));

        let mut config = lone_lowland_config(1);
        config.initial_population[0].location = Location::new(1, 1);
        assert!(matches!(
            Simulation::new(config),
            Err(Error::ImpassableLocation(_))
        ));
    }

    #[test]
    fn test_herbivores_persist_on_single_lowland() {
        let mut sim = Simulation::new(lone_lowland_config(42)).unwrap();
        for _ in 0..100 {
            sim.step();
            let count = sim.num_animals();
            assert!(count > 0, "population died out in year {}", sim.year());
            assert!(count <= 1500, "population exploded to {} in year {}", count, sim.year());
        }
        assert_eq!(sim.year(), 100);
        assert_eq!(sim.totals().years, 100);
        assert_eq!(sim.num_animals_per_species().carnivores, 0);
    }

    #[test]
    fn test_same_seed_same_history() {
        let run = |seed| {
            let mut sim = Simulation::new(lone_lowland_config(seed)).unwrap();
            sim.add_population(&carnivores(20)).unwrap();
            (0..30)
                .map(|_| {
                    sim.step();
                    sim.num_animals_per_species()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_simulate_continues_year_count() {
        let mut sim = Simulation::new(lone_lowland_config(3)).unwrap();
        sim.simulate(5);
        assert_eq!(sim.year(), 5);
        sim.simulate(7);
        assert_eq!(sim.year(), 12);
        sim.simulate(0);
        assert_eq!(sim.year(), 12);
    }

    #[test]
    fn test_observability_is_idempotent() {
        let mut sim = Simulation::new(lone_lowland_config(5)).unwrap();
        sim.add_population(&carnivores(10)).unwrap();
        sim.simulate(10);

        assert_eq!(sim.snapshot(), sim.snapshot());
        assert_eq!(sim.distributions(), sim.distributions());

        let counts = sim.num_animals_per_species();
        let cell_total: usize = sim
            .cell_counts()
            .iter()
            .map(|c| c.herbivores + c.carnivores)
            .sum();
        assert_eq!(cell_total, counts.total());
        assert_eq!(sim.distributions().herbivore.len(), counts.herbivores);
        assert_eq!(sim.histograms().carnivore.weight.total(), counts.carnivores);
    }

    #[test]
    fn test_observer_cadence() {
        let mut sim = Simulation::new(lone_lowland_config(8)).unwrap();
        let mut years = Vec::new();
        let mut observer = |snapshot: &Snapshot| years.push(snapshot.year);
        sim.simulate_observed(10, 3, &mut observer).unwrap();

        assert_eq!(years, vec![0, 3, 6, 9]);
        assert_eq!(sim.year(), 10);
    }

    #[test]
    fn test_observer_cadence_follows_absolute_years() {
        let mut sim = Simulation::new(lone_lowland_config(8)).unwrap();
        sim.simulate(2);

        let mut years = Vec::new();
        let mut observer = |snapshot: &Snapshot| years.push(snapshot.year);
        sim.simulate_observed(8, 3, &mut observer).unwrap();

        assert_eq!(years, vec![2, 3, 6, 9]);
    }

    #[test]
    fn test_oversized_histogram_rejected_at_setup() {
        let mut config = lone_lowland_config(1);
        config.hist_specs.age = biosim_core::HistogramSpec::new(1e30, 1e-10);
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));
    }

    #[test]
    fn test_zero_vis_years_rejected() {
        let mut sim = Simulation::new(lone_lowland_config(8)).unwrap();
        let mut observer = |_: &Snapshot| {};
        let result = sim.simulate_observed(10, 0, &mut observer);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(sim.year(), 0);
    }

    #[test]
    fn test_parameter_overrides_take_effect() {
        let mut sim = Simulation::new(lone_lowland_config(2)).unwrap();
        let no_death: ParameterOverrides = [("omega".to_string(), 0.0), ("gamma".to_string(), 0.0)]
            .into_iter()
            .collect();
        sim.set_animal_parameters(Species::Herbivore, &no_death).unwrap();
        sim.simulate(3);
        assert_eq!(sim.num_animals(), 150);
        assert_eq!(sim.totals().totals.births.herbivores, 0);

        let bad: ParameterOverrides = [("f_max".to_string(), -1.0)].into_iter().collect();
        assert!(sim.set_landscape_parameters(Terrain::Lowland, &bad).is_err());
        assert_eq!(sim.params().lowland.f_max, 800.0);
    }

    #[test]
    fn test_rejected_population_leaves_state_untouched() {
        let mut sim = Simulation::new(lone_lowland_config(2)).unwrap();
        let mut entries = carnivores(5);
        entries.push(PopulationEntry::new(
            Location::new(4, 4),
            vec![AnimalRecord::new(Species::Carnivore, 1, 5.0)],
        ));
        assert!(matches!(
            sim.add_population(&entries),
            Err(Error::InvalidLocation(_))
        ));
        assert_eq!(sim.num_animals_per_species(), SpeciesCounts::new(150, 0));
    }
}
