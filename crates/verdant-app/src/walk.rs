//! Scripted focal point movement along a looping waypoint path.

use glam::DVec2;

pub struct Walker {
    waypoints: Vec<DVec2>,
    speed: f64,
    position: DVec2,
    next: usize,
    distance: f64,
}

impl Walker {
    /// Start at the first waypoint (or the origin when there are none)
    /// heading for the second. `speed` is in world units per second.
    pub fn new(waypoints: &[[f64; 2]], speed: f64) -> Self {
        let waypoints: Vec<DVec2> = waypoints
            .iter()
            .map(|&[x, z]| DVec2::new(x, z))
            .filter(|p| p.is_finite())
            .collect();
        let position = waypoints.first().copied().unwrap_or(DVec2::ZERO);
        Self {
            next: 1 % waypoints.len().max(1),
            waypoints,
            speed: if speed.is_finite() { speed.max(0.0) } else { 0.0 },
            position,
            distance: 0.0,
        }
    }

    /// Move for `dt` seconds and return the new position.
    pub fn advance(&mut self, dt: f64) -> DVec2 {
        if self.waypoints.len() < 2 {
            return self.position;
        }
        let mut remaining = self.speed * dt.max(0.0);
        // Zero-length legs are skipped; give up after a full lap of them.
        let mut empty_legs = 0;
        while remaining > 0.0 && empty_legs <= self.waypoints.len() {
            let goal = self.waypoints[self.next];
            let leg = self.position.distance(goal);
            if leg <= remaining {
                self.position = goal;
                self.distance += leg;
                remaining -= leg;
                self.next = (self.next + 1) % self.waypoints.len();
                empty_legs = if leg == 0.0 { empty_legs + 1 } else { 0 };
            } else {
                self.position += (goal - self.position) / leg * remaining;
                self.distance += remaining;
                remaining = 0.0;
            }
        }
        self.position
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Total distance walked.
    pub fn distance(&self) -> f64 {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_toward_next_waypoint() {
        let mut walker = Walker::new(&[[0.0, 0.0], [10.0, 0.0]], 2.0);
        let p = walker.advance(1.0);
        assert!((p - DVec2::new(2.0, 0.0)).length() < 1e-12);
        assert!((walker.distance() - 2.0).abs() < 1e-12);
    }

    /// Overshooting a waypoint carries the remainder onto the next leg.
    #[test]
    fn test_turns_corners() {
        let mut walker = Walker::new(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]], 1.0);
        let p = walker.advance(13.0);
        assert!((p - DVec2::new(10.0, 3.0)).length() < 1e-9, "got {p}");
    }

    #[test]
    fn test_path_loops() {
        let mut walker = Walker::new(&[[0.0, 0.0], [4.0, 0.0]], 1.0);
        walker.advance(4.0);
        let p = walker.advance(1.0);
        assert!((p - DVec2::new(3.0, 0.0)).length() < 1e-12, "heading back, got {p}");
    }

    #[test]
    fn test_degenerate_paths_stand_still() {
        let mut none = Walker::new(&[], 5.0);
        assert_eq!(none.advance(1.0), DVec2::ZERO);

        let mut single = Walker::new(&[[3.0, 4.0]], 5.0);
        assert_eq!(single.advance(1.0), DVec2::new(3.0, 4.0));

        let mut same = Walker::new(&[[1.0, 1.0], [1.0, 1.0]], 5.0);
        assert_eq!(same.advance(1.0), DVec2::new(1.0, 1.0));
    }

    #[test]
    fn test_non_finite_waypoints_dropped() {
        let mut walker = Walker::new(&[[f64::NAN, 0.0], [0.0, 0.0], [6.0, 0.0]], 3.0);
        assert_eq!(walker.position(), DVec2::ZERO);
        assert!((walker.advance(1.0).x - 3.0).abs() < 1e-12);
    }
}
