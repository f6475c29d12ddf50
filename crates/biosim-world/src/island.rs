//! The island: a rectangular grid of terrain cells surrounded by water.

use crate::cell::{Cell, MigrationCandidates};
use biosim_core::{
    CellCount, Direction, Distributions, Error, Location, ParameterRegistry, PopulationEntry,
    Result, Species, SpeciesCounts, Terrain, YearSummary,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// Row-major grid of cells addressed by 1-indexed [`Location`]s
#[derive(Debug, Clone)]
pub struct Island {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Island {
    /// Parse and validate a map, one terrain code per character and one row per line.
    ///
    /// Indentation shared by all rows is removed, as are trailing whitespace
    /// and blank lines before the first and after the last row. Any further
    /// indentation is part of the row and fails as an unknown terrain code.
    pub fn from_map(map: &str) -> Result<Self> {
        let mut lines: Vec<&str> = map.lines().map(str::trim_end).collect();
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        if lines.is_empty() {
            return Err(Error::EmptyMap);
        }
        let indent = lines
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
            .min()
            .unwrap_or(0);

        let mut grid: Vec<Vec<Terrain>> = Vec::with_capacity(lines.len());
        for (r, line) in lines.iter().enumerate() {
            let row = line
                .chars()
                .skip(indent)
                .enumerate()
                .map(|(c, symbol)| {
                    Terrain::from_symbol(symbol).ok_or(Error::UnknownTerrain {
                        symbol,
                        row: r + 1,
                        col: c + 1,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            grid.push(row);
        }

        let cols = grid[0].len();
        for (r, row) in grid.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::UnequalRowLengths {
                    row: r + 1,
                    expected: cols,
                    found: row.len(),
                });
            }
        }

        let rows = grid.len();
        for (r, row) in grid.iter().enumerate() {
            for (c, terrain) in row.iter().enumerate() {
                let on_edge = r == 0 || r == rows - 1 || c == 0 || c == cols - 1;
                if on_edge && *terrain != Terrain::Water {
                    return Err(Error::OpenBoundary {
                        symbol: terrain.symbol(),
                        row: r + 1,
                        col: c + 1,
                    });
                }
            }
        }

        let cells = grid.into_iter().flatten().map(Cell::new).collect();
        debug!(rows, cols, "Island map parsed");
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index_of(&self, loc: Location) -> Option<usize> {
        if loc.row == 0 || loc.col == 0 || loc.row > self.rows || loc.col > self.cols {
            return None;
        }
        Some((loc.row - 1) * self.cols + (loc.col - 1))
    }

    /// Get location from index
    pub fn index_to_location(&self, index: usize) -> Location {
        Location::new(index / self.cols + 1, index % self.cols + 1)
    }

    pub fn cell(&self, loc: Location) -> Option<&Cell> {
        self.index_of(loc).map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, loc: Location) -> Option<&mut Cell> {
        self.index_of(loc).map(move |i| &mut self.cells[i])
    }

    /// Iterator over all cells with locations, row by row
    pub fn iter(&self) -> impl Iterator<Item = (Location, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.index_to_location(i), cell))
    }

    /// Check every entry of a population batch without changing anything
    pub fn validate_population(&self, entries: &[PopulationEntry]) -> Result<()> {
        for entry in entries {
            let cell = self
                .cell(entry.location)
                .ok_or(Error::InvalidLocation(entry.location))?;
            if !cell.is_passable() && !entry.individuals.is_empty() {
                return Err(Error::ImpassableLocation(entry.location));
            }
            cell.validate_records(&entry.individuals)?;
        }
        Ok(())
    }

    /// Place a population batch; the whole batch is validated before any animal is added
    pub fn add_population(&mut self, entries: &[PopulationEntry]) -> Result<()> {
        self.validate_population(entries)?;
        for entry in entries {
            if let Some(cell) = self.cell_mut(entry.location) {
                cell.add_population(&entry.individuals)?;
            }
        }
        Ok(())
    }

    /// Run one year on every cell.
    ///
    /// Every passable cell runs its full pipeline first, in row-major order,
    /// and its migration candidates are recorded. Candidates are then
    /// resolved in the same order. Arrivals are appended behind the recorded
    /// indices, so an animal moves at most once per year.
    pub fn annual_cycle(&mut self, params: &ParameterRegistry, rng: &mut ChaCha8Rng) -> YearSummary {
        let mut summary = YearSummary::default();
        let mut pending: Vec<(usize, MigrationCandidates)> = Vec::new();

        for (index, cell) in self.cells.iter_mut().enumerate() {
            if !cell.is_passable() {
                continue;
            }
            let (cell_summary, candidates) = cell.run_year(params, rng);
            summary.merge(&cell_summary);
            if !candidates.is_empty() {
                pending.push((index, candidates));
            }
        }

        for (index, candidates) in pending {
            let moves = self.resolve_migration(index, &candidates, rng);
            summary.merge(&moves);
        }

        summary
    }

    /// Move the candidates of one cell, one direction draw each.
    ///
    /// A draw onto an impassable cell cancels that animal's move for the year.
    fn resolve_migration(
        &mut self,
        origin: usize,
        candidates: &MigrationCandidates,
        rng: &mut ChaCha8Rng,
    ) -> YearSummary {
        let mut summary = YearSummary::default();
        let from = self.index_to_location(origin);
        let directions = Direction::all();

        for species in Species::all() {
            let mut movers = Vec::new();
            let mut destinations = Vec::new();
            let mut blocked = 0;

            for &animal_index in candidates.get(species) {
                let direction = directions[rng.gen_range(0..directions.len())];
                let target = from
                    .step(direction)
                    .and_then(|loc| self.index_of(loc))
                    .filter(|&i| self.cells[i].is_passable());
                match target {
                    Some(destination) => {
                        movers.push(animal_index);
                        destinations.push(destination);
                    }
                    None => blocked += 1,
                }
            }

            let moved = movers.len();
            let animals = self.cells[origin].take_animals(species, &movers);
            for (animal, destination) in animals.into_iter().zip(destinations) {
                self.cells[destination].receive(animal);
            }

            if moved > 0 || blocked > 0 {
                trace!(
                    species = %species,
                    from = %from,
                    moved,
                    blocked,
                    "Migration resolved"
                );
            }

            match species {
                Species::Herbivore => {
                    summary.migrations.herbivores = moved;
                    summary.blocked_migrations.herbivores = blocked;
                }
                Species::Carnivore => {
                    summary.migrations.carnivores = moved;
                    summary.blocked_migrations.carnivores = blocked;
                }
            }
        }

        summary
    }

    pub fn counts(&self) -> SpeciesCounts {
        self.cells.iter().map(Cell::counts).sum()
    }

    /// Species counts of every cell, row by row
    pub fn cell_counts(&self) -> Vec<CellCount> {
        self.iter()
            .map(|(loc, cell)| CellCount {
                row: loc.row,
                col: loc.col,
                herbivores: cell.herbivores().len(),
                carnivores: cell.carnivores().len(),
            })
            .collect()
    }

    /// Age, weight and current fitness of every live animal
    pub fn distributions(&self, params: &ParameterRegistry) -> Distributions {
        let mut distributions = Distributions::default();
        for cell in &self.cells {
            for species in Species::all() {
                let species_params = params.species(species);
                let samples = distributions.species_mut(species);
                for animal in cell.animals(species) {
                    samples.push(animal.age, animal.weight, animal.fitness(species_params));
                }
            }
        }
        distributions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_core::{AnimalRecord, ParameterOverrides};
    use proptest::prelude::*;
    use rand::SeedableRng;

    const SMALL_MAP: &str = "\
WWWWW
WLHDW
WLLLW
WWWWW";

    fn overrides(entries: &[(&str, f64)]) -> ParameterOverrides {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn herbivore_entry(row: usize, col: usize, count: usize) -> PopulationEntry {
        PopulationEntry::new(
            Location::new(row, col),
            (0..count)
                .map(|_| AnimalRecord::new(Species::Herbivore, 5, 20.0))
                .collect(),
        )
    }

    fn carnivore_entry(row: usize, col: usize, count: usize) -> PopulationEntry {
        PopulationEntry::new(
            Location::new(row, col),
            (0..count)
                .map(|_| AnimalRecord::new(Species::Carnivore, 5, 20.0))
                .collect(),
        )
    }

    /// Parameters where nobody is born or dies, and every animal tries to move
    fn restless_params() -> ParameterRegistry {
        let mut params = ParameterRegistry::default();
        for species in Species::all() {
            params
                .set_animal_parameters(
                    species,
                    &overrides(&[("omega", 0.0), ("gamma", 0.0), ("mu", 100.0)]),
                )
                .unwrap();
        }
        params
    }

    #[test]
    fn test_island_creation() {
        let island = Island::from_map(SMALL_MAP).unwrap();
        assert_eq!(island.rows(), 4);
        assert_eq!(island.cols(), 5);
        assert_eq!(island.iter().count(), 20);
        assert_eq!(
            island.cell(Location::new(2, 3)).map(Cell::terrain),
            Some(Terrain::Highland)
        );
        assert_eq!(
            island.cell(Location::new(2, 4)).map(Cell::terrain),
            Some(Terrain::Desert)
        );
        assert!(island.cell(Location::new(0, 1)).is_none());
        assert!(island.cell(Location::new(5, 1)).is_none());
    }

    #[test]
    fn test_map_is_dedented() {
        let map = "
            WWW
            WLW
            WWW
        ";
        let island = Island::from_map(map).unwrap();
        assert_eq!(island.rows(), 3);
        assert_eq!(island.cols(), 3);
    }

    #[test]
    fn test_rejects_uneven_indentation() {
        let map = "  WWW\n   WLW\n  WWW";
        let result = Island::from_map(map);
        assert!(matches!(
            result,
            Err(Error::UnknownTerrain { symbol: ' ', row: 2, col: 1 })
        ));

        let map = "   WWW\n  WLW\n   WWW";
        let result = Island::from_map(map);
        assert!(matches!(
            result,
            Err(Error::UnknownTerrain { symbol: ' ', row: 1, col: 1 })
        ));
    }

    #[test]
    fn test_rejects_non_water_edge_column() {
        let result = Island::from_map("WWW\nWLL\nWWW");
        assert!(matches!(
            result,
            Err(Error::OpenBoundary { symbol: 'L', row: 2, col: 3 })
        ));

        let result = Island::from_map("WWW\nHLW\nWWW");
        assert!(matches!(result, Err(Error::OpenBoundary { col: 1, .. })));
    }

    #[test]
    fn test_rejects_non_water_edge_row() {
        let result = Island::from_map("WLW\nWLW\nWWW");
        assert!(matches!(result, Err(Error::OpenBoundary { row: 1, .. })));
    }

    #[test]
    fn test_rejects_unequal_rows() {
        let result = Island::from_map("WWWW\nWLW\nWWWW");
        assert!(matches!(
            result,
            Err(Error::UnequalRowLengths { row: 2, expected: 4, found: 3 })
        ));
    }

    #[test]
    fn test_rejects_unknown_terrain() {
        let result = Island::from_map("WWW\nWXW\nWWW");
        assert!(matches!(
            result,
            Err(Error::UnknownTerrain { symbol: 'X', row: 2, col: 2 })
        ));
    }

    #[test]
    fn test_rejects_empty_map() {
        assert!(matches!(Island::from_map(""), Err(Error::EmptyMap)));
        assert!(matches!(Island::from_map("  \n \n"), Err(Error::EmptyMap)));
    }

    #[test]
    fn test_add_population() {
        let mut island = Island::from_map(SMALL_MAP).unwrap();
        island
            .add_population(&[herbivore_entry(2, 2, 10), carnivore_entry(3, 3, 4)])
            .unwrap();
        assert_eq!(island.counts(), SpeciesCounts::new(10, 4));
        assert_eq!(
            island.cell(Location::new(3, 3)).map(Cell::counts),
            Some(SpeciesCounts::new(0, 4))
        );
    }

    #[test]
    fn test_add_population_is_atomic() {
        let mut island = Island::from_map(SMALL_MAP).unwrap();

        let result = island.add_population(&[herbivore_entry(2, 2, 10), herbivore_entry(1, 1, 3)]);
        assert!(matches!(result, Err(Error::ImpassableLocation(_))));
        assert_eq!(island.counts().total(), 0);

        let result = island.add_population(&[herbivore_entry(2, 2, 10), herbivore_entry(9, 9, 3)]);
        assert!(matches!(result, Err(Error::InvalidLocation(_))));
        assert_eq!(island.counts().total(), 0);
    }

    #[test]
    fn test_cell_counts_cover_every_cell() {
        let mut island = Island::from_map(SMALL_MAP).unwrap();
        island.add_population(&[herbivore_entry(3, 4, 7)]).unwrap();

        let counts = island.cell_counts();
        assert_eq!(counts.len(), 20);
        assert_eq!(counts[0], CellCount { row: 1, col: 1, herbivores: 0, carnivores: 0 });
        let occupied: Vec<_> = counts.iter().filter(|c| c.herbivores > 0).collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!((occupied[0].row, occupied[0].col, occupied[0].herbivores), (3, 4, 7));
    }

    #[test]
    fn test_distributions_match_population() {
        let params = ParameterRegistry::default();
        let mut island = Island::from_map(SMALL_MAP).unwrap();
        island
            .add_population(&[herbivore_entry(2, 2, 3), carnivore_entry(2, 3, 2)])
            .unwrap();

        let distributions = island.distributions(&params);
        assert_eq!(distributions.herbivore.len(), 3);
        assert_eq!(distributions.carnivore.len(), 2);
        assert!(distributions.herbivore.fitness.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn test_migration_never_enters_water() {
        let params = restless_params();
        let mut island = Island::from_map("WWW\nWLW\nWWW").unwrap();
        island
            .add_population(&[herbivore_entry(2, 2, 50), carnivore_entry(2, 2, 20)])
            .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..5 {
            let summary = island.annual_cycle(&params, &mut rng);
            assert_eq!(summary.migrations.total(), 0);
        }
        let centre = island.cell(Location::new(2, 2)).map(|c| c.counts().total());
        assert_eq!(centre, Some(island.counts().total()));
    }

    #[test]
    fn test_migration_moves_to_neighbours() {
        let params = restless_params();
        let mut island = Island::from_map(
            "\
WWWWW
WLLLW
WLLLW
WLLLW
WWWWW",
        )
        .unwrap();
        island.add_population(&[carnivore_entry(3, 3, 40)]).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let summary = island.annual_cycle(&params, &mut rng);

        assert_eq!(island.counts(), SpeciesCounts::new(0, 40));
        assert_eq!(summary.migrations.carnivores, 40);
        let centre = island.cell(Location::new(3, 3)).map(|c| c.carnivores().len());
        assert_eq!(centre, Some(0));
        let neighbours: usize = [(2, 3), (4, 3), (3, 2), (3, 4)]
            .iter()
            .filter_map(|&(r, c)| island.cell(Location::new(r, c)))
            .map(|cell| cell.carnivores().len())
            .sum();
        assert_eq!(neighbours, 40);
        let corners: usize = [(2, 2), (2, 4), (4, 2), (4, 4)]
            .iter()
            .filter_map(|&(r, c)| island.cell(Location::new(r, c)))
            .map(|cell| cell.carnivores().len())
            .sum();
        assert_eq!(corners, 0);
    }

    #[test]
    fn test_water_cells_stay_empty() {
        let params = restless_params();
        let mut island = Island::from_map(SMALL_MAP).unwrap();
        island
            .add_population(&[herbivore_entry(2, 2, 30), carnivore_entry(3, 4, 30)])
            .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            island.annual_cycle(&params, &mut rng);
            for (_, cell) in island.iter() {
                if !cell.is_passable() {
                    assert!(cell.is_empty());
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_migration_conserves_animals(
            herbivores in 0usize..40,
            carnivores in 0usize..40,
            seed in any::<u64>(),
        ) {
            let params = restless_params();
            let mut island = Island::from_map(SMALL_MAP).unwrap();
            island
                .add_population(&[herbivore_entry(2, 2, herbivores), carnivore_entry(3, 3, carnivores)])
                .unwrap();

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let summary = island.annual_cycle(&params, &mut rng);
            let kills = summary.herbivores_killed;

            prop_assert_eq!(island.counts().carnivores, carnivores);
            prop_assert_eq!(island.counts().herbivores + kills, herbivores);
            for (_, cell) in island.iter() {
                if !cell.is_passable() {
                    prop_assert!(cell.is_empty());
                }
            }
        }
    }
}
