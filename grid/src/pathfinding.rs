//! A* route planner over the spatial grid.

use std::{cmp::Reverse, collections::BinaryHeap};

use farm_defence_core::GridCoord;

use crate::SpatialGrid;

/// Neighbour offsets in expansion order.
const NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Open-set entry ordered by f-score, then by insertion sequence.
type OpenEntry = Reverse<(u32, u64, usize)>;

/// Plans a route from `start` to `goal` with unit step costs and a Manhattan
/// heuristic. Unwalkable cells are never expanded; the start cell itself is
/// not checked so traffic standing on a fresh obstacle can still leave it.
///
/// Returns `None` when either end lies outside the grid or the goal cannot be
/// reached.
pub(crate) fn plan(grid: &SpatialGrid, start: GridCoord, goal: GridCoord) -> Option<Vec<GridCoord>> {
    let start_index = grid.index(start)?;
    let goal_index = grid.index(goal)?;
    let cells = grid.cells();

    let mut g_scores = vec![u32::MAX; cells.len()];
    let mut came_from: Vec<Option<usize>> = vec![None; cells.len()];
    let mut closed = vec![false; cells.len()];
    let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
    let mut sequence = 0_u64;

    g_scores[start_index] = 0;
    open.push(Reverse((start.manhattan_distance(goal), sequence, start_index)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        if closed[current] {
            continue;
        }
        if current == goal_index {
            return Some(reconstruct(grid, &came_from, current));
        }
        closed[current] = true;

        let coord = cells[current].coord();
        let next_score = g_scores[current] + 1;

        for (dx, dz) in NEIGHBOURS {
            let neighbour = coord.offset(dx, dz);
            let Some(index) = grid.index(neighbour) else {
                continue;
            };
            if closed[index] || !cells[index].is_walkable() {
                continue;
            }
            if next_score >= g_scores[index] {
                continue;
            }

            g_scores[index] = next_score;
            came_from[index] = Some(current);
            sequence += 1;
            open.push(Reverse((
                next_score + neighbour.manhattan_distance(goal),
                sequence,
                index,
            )));
        }
    }

    None
}

fn reconstruct(grid: &SpatialGrid, came_from: &[Option<usize>], goal: usize) -> Vec<GridCoord> {
    let cells = grid.cells();
    let mut route = vec![cells[goal].coord()];
    let mut current = goal;
    while let Some(previous) = came_from[current] {
        route.push(cells[previous].coord());
        current = previous;
    }
    route.reverse();
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_defence_core::ServiceId;
    use slotmap::SlotMap;

    fn block(grid: &mut SpatialGrid, cells: &[(i32, i32)]) {
        let mut arena: SlotMap<ServiceId, ()> = SlotMap::with_key();
        for &(x, z) in cells {
            assert!(grid.occupy_cell(GridCoord::new(x, z), arena.insert(())));
        }
    }

    #[test]
    fn open_grid_route_has_manhattan_length() {
        let grid = SpatialGrid::new(6, 6, 1.0);
        let start = GridCoord::new(0, 0);
        let goal = GridCoord::new(4, 3);

        let route = plan(&grid, start, goal).expect("route exists");

        assert_eq!(route.len(), 8);
        assert_eq!(route.first(), Some(&start));
        assert_eq!(route.last(), Some(&goal));
        for pair in route.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }

    #[test]
    fn route_prefers_positive_x_on_ties() {
        let grid = SpatialGrid::new(3, 3, 1.0);
        let route = plan(&grid, GridCoord::new(0, 0), GridCoord::new(1, 1)).expect("route");
        assert_eq!(route[1], GridCoord::new(1, 0));
    }

    #[test]
    fn corridor_forces_detour() {
        let mut grid = SpatialGrid::new(5, 3, 1.0);
        block(&mut grid, &[(2, 0), (2, 1)]);

        let route = plan(&grid, GridCoord::new(0, 1), GridCoord::new(4, 1)).expect("detour");

        assert!(route.contains(&GridCoord::new(2, 2)));
        assert_eq!(route.len(), 7);
        assert!(route
            .iter()
            .all(|coord| grid.cell(*coord).is_some_and(|cell| cell.is_walkable())));
    }

    #[test]
    fn sealed_corridor_has_no_route() {
        let mut grid = SpatialGrid::new(5, 3, 1.0);
        block(&mut grid, &[(2, 0), (2, 1), (2, 2)]);

        assert_eq!(plan(&grid, GridCoord::new(0, 1), GridCoord::new(4, 1)), None);
    }

    #[test]
    fn start_equal_to_goal_is_a_single_cell() {
        let grid = SpatialGrid::new(3, 3, 1.0);
        let cell = GridCoord::new(1, 1);
        assert_eq!(plan(&grid, cell, cell), Some(vec![cell]));
    }

    #[test]
    fn out_of_bounds_endpoints_have_no_route() {
        let grid = SpatialGrid::new(3, 3, 1.0);
        assert_eq!(plan(&grid, GridCoord::new(-1, 0), GridCoord::new(1, 1)), None);
    }
}
