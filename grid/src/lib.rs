#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative spatial grid for Farm Defence.
//!
//! The grid owns every cell for the lifetime of a session. Services claim
//! cells through [`SpatialGrid::occupy_cell`], which turns them into
//! obstacles for the A* planner used by traffic. Range queries measure the
//! Euclidean distance from a world position to each candidate cell centre so
//! that targeting behaves identically for services and traffic.

mod pathfinding;

use std::collections::BTreeMap;

use farm_defence_core::{GridConfig, GridCoord, ServiceId, TrafficId};
use glam::{Vec2, Vec3};

/// Single cell of the spatial grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell {
    coord: GridCoord,
    world_position: Vec3,
    walkable: bool,
    occupant: Option<ServiceId>,
    traversal_cost: f32,
}

impl GridCell {
    /// Grid coordinate of the cell.
    #[must_use]
    pub const fn coord(&self) -> GridCoord {
        self.coord
    }

    /// World position of the cell centre.
    #[must_use]
    pub const fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// Whether traffic may path through the cell.
    #[must_use]
    pub const fn is_walkable(&self) -> bool {
        self.walkable
    }

    /// Whether a service occupies the cell.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// Service occupying the cell, if any.
    #[must_use]
    pub const fn occupant(&self) -> Option<ServiceId> {
        self.occupant
    }

    /// Relative cost of crossing the cell.
    #[must_use]
    pub const fn traversal_cost(&self) -> f32 {
        self.traversal_cost
    }
}

/// Fixed-size grid of cells centred on the world origin.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    columns: u32,
    rows: u32,
    cell_size: f32,
    origin: Vec2,
    cells: Vec<GridCell>,
}

impl SpatialGrid {
    /// Creates a grid with every cell free and walkable.
    #[must_use]
    pub fn new(columns: u32, rows: u32, cell_size: f32) -> Self {
        let origin = Vec2::new(
            -(columns as f32 * cell_size) / 2.0,
            -(rows as f32 * cell_size) / 2.0,
        );
        let capacity = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0);
        let mut grid = Self {
            columns,
            rows,
            cell_size,
            origin,
            cells: Vec::with_capacity(capacity),
        };

        for z in 0..rows {
            for x in 0..columns {
                let coord = GridCoord::new(x as i32, z as i32);
                let world_position = grid.grid_to_world(coord);
                grid.cells.push(GridCell {
                    coord,
                    world_position,
                    walkable: true,
                    occupant: None,
                    traversal_cost: 1.0,
                });
            }
        }

        grid
    }

    /// Creates a grid using the configured dimensions.
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.columns, config.rows, config.cell_size)
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Edge length of a cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Maps a world position onto the cell containing it.
    ///
    /// Positions outside the grid map to out-of-bounds coordinates.
    #[must_use]
    pub fn world_to_grid(&self, position: Vec3) -> GridCoord {
        let x = ((position.x - self.origin.x) / self.cell_size).floor();
        let z = ((position.z - self.origin.y) / self.cell_size).floor();
        GridCoord::new(x as i32, z as i32)
    }

    /// World position of the centre of the provided cell.
    #[must_use]
    pub fn grid_to_world(&self, coord: GridCoord) -> Vec3 {
        Vec3::new(
            self.origin.x + (coord.x() as f32 + 0.5) * self.cell_size,
            0.0,
            self.origin.y + (coord.z() as f32 + 0.5) * self.cell_size,
        )
    }

    /// Snaps a world position to the centre of its cell.
    #[must_use]
    pub fn snap_to_grid(&self, position: Vec3) -> Vec3 {
        self.grid_to_world(self.world_to_grid(position))
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.index(coord).is_some()
    }

    /// Cell stored at the coordinate, if it lies inside the grid.
    #[must_use]
    pub fn cell(&self, coord: GridCoord) -> Option<&GridCell> {
        self.index(coord).map(|index| &self.cells[index])
    }

    /// Every cell in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Cell that traffic walks toward.
    #[must_use]
    pub const fn center(&self) -> GridCoord {
        GridCoord::new((self.columns / 2) as i32, (self.rows / 2) as i32)
    }

    /// True iff the coordinate is inside the grid, unoccupied and walkable.
    #[must_use]
    pub fn is_valid_placement(&self, coord: GridCoord) -> bool {
        self.cell(coord)
            .is_some_and(|cell| !cell.is_occupied() && cell.walkable)
    }

    /// Claims a cell for a service. Returns `false` without mutating anything
    /// when the cell is out of bounds or already occupied.
    pub fn occupy_cell(&mut self, coord: GridCoord, occupant: ServiceId) -> bool {
        let Some(index) = self.index(coord) else {
            return false;
        };
        let cell = &mut self.cells[index];
        if cell.is_occupied() {
            return false;
        }
        cell.occupant = Some(occupant);
        cell.walkable = false;
        true
    }

    /// Releases a cell. Freeing a free or out-of-bounds cell does nothing.
    pub fn free_cell(&mut self, coord: GridCoord) {
        if let Some(index) = self.index(coord) {
            let cell = &mut self.cells[index];
            cell.occupant = None;
            cell.walkable = true;
        }
    }

    /// Cells whose centres lie within `radius` of `center`.
    ///
    /// Candidates come from the bounding box of `ceil(radius / cell_size)`
    /// cells around the cell containing `center`, visited column by column.
    #[must_use]
    pub fn cells_in_range(&self, center: Vec3, radius: f32) -> Vec<GridCoord> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        let origin = self.world_to_grid(center);
        let reach = (radius / self.cell_size).ceil() as i32;
        let mut found = Vec::new();

        for dx in -reach..=reach {
            for dz in -reach..=reach {
                let Some(cell) = self.cell(origin.offset(dx, dz)) else {
                    continue;
                };
                if center.distance(cell.world_position) <= radius {
                    found.push(cell.coord);
                }
            }
        }

        found
    }

    /// Services occupying cells within `radius` of `center`.
    #[must_use]
    pub fn entities_in_range(&self, center: Vec3, radius: f32) -> Vec<ServiceId> {
        self.cells_in_range(center, radius)
            .into_iter()
            .filter_map(|coord| self.cell(coord).and_then(GridCell::occupant))
            .collect()
    }

    /// Plans a 4-connected route between two cells and returns the cell
    /// centres along it, start and end included.
    ///
    /// When either end lies outside the grid or no route exists, the result
    /// degrades to the straight line `[start, end]`, which may cross
    /// obstacles.
    #[must_use]
    pub fn find_path(&self, start: GridCoord, end: GridCoord) -> Vec<Vec3> {
        match pathfinding::plan(self, start, end) {
            Some(route) => route
                .into_iter()
                .map(|coord| self.grid_to_world(coord))
                .collect(),
            None => vec![self.grid_to_world(start), self.grid_to_world(end)],
        }
    }

    /// Number of cells currently hosting a service.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_occupied()).count()
    }

    /// Checks that no cell is both occupied and walkable, or neither.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.is_occupied() != cell.walkable)
    }

    pub(crate) fn index(&self, coord: GridCoord) -> Option<usize> {
        let x = u32::try_from(coord.x()).ok()?;
        let z = u32::try_from(coord.z()).ok()?;
        if x >= self.columns || z >= self.rows {
            return None;
        }
        let columns = usize::try_from(self.columns).ok()?;
        usize::try_from(z)
            .ok()?
            .checked_mul(columns)?
            .checked_add(usize::try_from(x).ok()?)
    }
}

/// Traffic positions bucketed by grid cell for range queries.
///
/// Services query this index with the same cell-centre distance rule that
/// [`SpatialGrid::entities_in_range`] applies to occupants.
#[derive(Clone, Debug, Default)]
pub struct TrafficIndex {
    buckets: BTreeMap<GridCoord, Vec<TrafficId>>,
}

impl TrafficIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records traffic at a world position. Positions off the grid are ignored.
    pub fn insert(&mut self, grid: &SpatialGrid, traffic: TrafficId, position: Vec3) {
        let coord = grid.world_to_grid(position);
        if grid.contains(coord) {
            self.buckets.entry(coord).or_default().push(traffic);
        }
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether the index holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Traffic standing in cells within `radius` of `center`.
    #[must_use]
    pub fn in_range(&self, grid: &SpatialGrid, center: Vec3, radius: f32) -> Vec<TrafficId> {
        grid.cells_in_range(center, radius)
            .into_iter()
            .filter_map(|coord| self.buckets.get(&coord))
            .flatten()
            .copied()
            .collect()
    }
}
