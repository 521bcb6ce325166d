//! Photon storage with fixed-radius queries.
//!
//! Photons are kept in a balanced kd-tree stored implicitly in one array:
//! every subrange `[start, end)` holds its splitting photon at the middle,
//! the lower half before it and the upper half after it.

use glint_core::{Aabb, Color, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photon {
    pub position: Vec3,
    /// Direction the photon arrived from (pointing away from the surface)
    pub direction: Vec3,
    pub power: Color,
}

impl Photon {
    pub fn new(position: Vec3, direction: Vec3, power: Color) -> Self {
        Self {
            position,
            direction,
            power,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhotonMap {
    photons: Vec<Photon>,
    /// Split axis of the node stored at the same index
    axes: Vec<u8>,
}

impl PhotonMap {
    /// Balance `photons` into a kd-tree.
    pub fn build(mut photons: Vec<Photon>) -> Self {
        let mut axes = vec![0; photons.len()];
        balance(&mut photons, &mut axes);
        Self { photons, axes }
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    /// Call `visit` for every photon within `radius` of `p`.
    pub fn search<F: FnMut(&Photon)>(&self, p: Vec3, radius: f32, mut visit: F) {
        self.search_range(0, self.photons.len(), p, radius * radius, &mut visit);
    }

    fn search_range<F: FnMut(&Photon)>(&self, start: usize, end: usize, p: Vec3, radius_squared: f32, visit: &mut F) {
        if start >= end {
            return;
        }
        let mid = start + (end - start) / 2;
        let photon = &self.photons[mid];
        let axis = self.axes[mid] as usize;
        let delta = p[axis] - photon.position[axis];

        if photon.position.distance_squared(p) <= radius_squared {
            visit(photon);
        }

        let (near, far) = if delta <= 0.0 {
            ((start, mid), (mid + 1, end))
        } else {
            ((mid + 1, end), (start, mid))
        };
        self.search_range(near.0, near.1, p, radius_squared, visit);
        if delta * delta <= radius_squared {
            self.search_range(far.0, far.1, p, radius_squared, visit);
        }
    }
}

fn balance(photons: &mut [Photon], axes: &mut [u8]) {
    if photons.len() <= 1 {
        return;
    }
    let bounds = photons
        .iter()
        .fold(Aabb::EMPTY, |acc, photon| acc.surrounding_point(photon.position));
    let axis = bounds.longest_axis();
    let mid = photons.len() / 2;

    photons.select_nth_unstable_by(mid, |a, b| a.position[axis].total_cmp(&b.position[axis]));
    axes[mid] = axis as u8;

    let (lower, rest) = photons.split_at_mut(mid);
    let (lower_axes, rest_axes) = axes.split_at_mut(mid);
    balance(lower, lower_axes);
    balance(&mut rest[1..], &mut rest_axes[1..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_photons(count: usize, seed: u64) -> Vec<Photon> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let position = Vec3::new(rng.gen(), rng.gen(), rng.gen());
                Photon::new(position, Vec3::Z, Color::ONE)
            })
            .collect()
    }

    #[test]
    fn test_empty_map() {
        let map = PhotonMap::build(Vec::new());
        assert!(map.is_empty());
        let mut found = 0;
        map.search(Vec3::ZERO, 1.0, |_| found += 1);
        assert_eq!(found, 0);
    }

    #[test]
    fn test_search_matches_linear_scan() {
        let photons = random_photons(2000, 4);
        let map = PhotonMap::build(photons.clone());
        assert_eq!(map.len(), 2000);

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let p = Vec3::new(rng.gen(), rng.gen(), rng.gen());
            let radius = 0.1;
            let expected = photons
                .iter()
                .filter(|photon| photon.position.distance(p) <= radius)
                .count();
            let mut found = 0;
            map.search(p, radius, |photon| {
                assert!(photon.position.distance(p) <= radius + 1e-6);
                found += 1;
            });
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_duplicate_positions_are_all_found() {
        let photons = vec![Photon::new(Vec3::splat(0.5), Vec3::Y, Color::ONE); 17];
        let map = PhotonMap::build(photons);
        let mut found = 0;
        map.search(Vec3::splat(0.5), 1e-3, |_| found += 1);
        assert_eq!(found, 17);
    }
}
