//! Core type definitions for the simulation.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two animal species living on the island
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Herbivore,
    Carnivore,
}

impl Species {
    pub fn all() -> [Species; 2] {
        [Species::Herbivore, Species::Carnivore]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Herbivore => "Herbivore",
            Species::Carnivore => "Carnivore",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Herbivore" => Ok(Species::Herbivore),
            "Carnivore" => Ok(Species::Carnivore),
            other => Err(Error::UnknownSpecies(other.to_string())),
        }
    }
}

/// Terrain type of a single island cell, keyed by its map code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Terrain {
    #[serde(rename = "W", alias = "Water")]
    Water,
    #[serde(rename = "D", alias = "Desert")]
    Desert,
    #[serde(rename = "H", alias = "Highland")]
    Highland,
    #[serde(rename = "L", alias = "Lowland")]
    Lowland,
}

impl Terrain {
    pub fn all() -> [Terrain; 4] {
        [
            Terrain::Water,
            Terrain::Desert,
            Terrain::Highland,
            Terrain::Lowland,
        ]
    }

    pub fn from_symbol(symbol: char) -> Option<Terrain> {
        match symbol {
            'W' => Some(Terrain::Water),
            'D' => Some(Terrain::Desert),
            'H' => Some(Terrain::Highland),
            'L' => Some(Terrain::Lowland),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Terrain::Water => 'W',
            Terrain::Desert => 'D',
            Terrain::Highland => 'H',
            Terrain::Lowland => 'L',
        }
    }

    /// Water is the only terrain animals cannot enter
    pub fn is_passable(&self) -> bool {
        !matches!(self, Terrain::Water)
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 1-indexed (row, column) coordinate on the island
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Location {
    pub row: usize,
    pub col: usize,
}

impl Location {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Orthogonal neighbour, or `None` when it would leave the 1-indexed coordinate space
    pub fn step(&self, direction: Direction) -> Option<Location> {
        let (dr, dc) = direction.to_delta();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        if row == 0 || col == 0 {
            return None;
        }
        Some(Location::new(row, col))
    }
}

impl From<(usize, usize)> for Location {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl From<Location> for (usize, usize) {
    fn from(loc: Location) -> Self {
        (loc.row, loc.col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Migration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// (row, column) offset
    pub fn to_delta(&self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
    }
}

/// One individual of an initial or added population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub species: Species,
    pub age: u32,
    pub weight: f64,
}

impl AnimalRecord {
    pub fn new(species: Species, age: u32, weight: f64) -> Self {
        Self {
            species,
            age,
            weight,
        }
    }
}

/// A batch of individuals placed into one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationEntry {
    #[serde(alias = "loc")]
    pub location: Location,
    #[serde(alias = "pop")]
    pub individuals: Vec<AnimalRecord>,
}

impl PopulationEntry {
    pub fn new(location: Location, individuals: Vec<AnimalRecord>) -> Self {
        Self {
            location,
            individuals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_symbols() {
        for terrain in Terrain::all() {
            assert_eq!(Terrain::from_symbol(terrain.symbol()), Some(terrain));
        }
        assert_eq!(Terrain::from_symbol('X'), None);
        assert_eq!(Terrain::from_symbol('w'), None);
    }

    #[test]
    fn test_only_water_is_impassable() {
        assert!(!Terrain::Water.is_passable());
        assert!(Terrain::Desert.is_passable());
        assert!(Terrain::Highland.is_passable());
        assert!(Terrain::Lowland.is_passable());
    }

    #[test]
    fn test_species_from_str() {
        assert_eq!("Herbivore".parse::<Species>().unwrap(), Species::Herbivore);
        assert_eq!("Carnivore".parse::<Species>().unwrap(), Species::Carnivore);
        assert!(matches!(
            "Omnivore".parse::<Species>(),
            Err(Error::UnknownSpecies(_))
        ));
    }

    #[test]
    fn test_location_step() {
        let loc = Location::new(3, 3);
        assert_eq!(loc.step(Direction::North), Some(Location::new(2, 3)));
        assert_eq!(loc.step(Direction::South), Some(Location::new(4, 3)));
        assert_eq!(loc.step(Direction::East), Some(Location::new(3, 4)));
        assert_eq!(loc.step(Direction::West), Some(Location::new(3, 2)));

        let corner = Location::new(1, 1);
        assert_eq!(corner.step(Direction::North), None);
        assert_eq!(corner.step(Direction::West), None);
    }

    #[test]
    fn test_population_entry_accepts_short_keys() {
        let json = r#"{"loc": [2, 2], "pop": [{"species": "Herbivore", "age": 5, "weight": 20.0}]}"#;
        let entry: PopulationEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.location, Location::new(2, 2));
        assert_eq!(entry.individuals.len(), 1);
        assert_eq!(entry.individuals[0].species, Species::Herbivore);
    }

    #[test]
    fn test_terrain_map_codes_in_json() {
        let terrain: Terrain = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(terrain, Terrain::Lowland);
        let terrain: Terrain = serde_json::from_str("\"Highland\"").unwrap();
        assert_eq!(terrain, Terrain::Highland);
        assert_eq!(serde_json::to_string(&Terrain::Desert).unwrap(), "\"D\"");
    }
}
