// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [Mesh]: the dense zone store for one hydro snapshot, loaded from a pair
//! of geometry and material-state files.

use super::zone::Zone;
use super::GeometryError;
use crate::io::TokenReader;

#[derive(Default)]
pub struct Mesh {
    zones: Vec<Zone>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Append a zone; ids are expected to arrive dense and in order.
    pub fn push_zone(&mut self, z: Zone) {
        self.zones.push(z);
    }

    pub fn zone(&self, i: usize) -> Result<&Zone, GeometryError> {
        self.zones.get(i).ok_or(GeometryError::MissingZone {
            zone: i,
            size: self.zones.len(),
        })
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The face every ray is launched against: face 0 of the bounding
    /// zone.
    pub fn bounding_sphere_face(&self) -> Result<&dyn super::face::Face, GeometryError> {
        Ok(self.zone(Zone::BOUNDING_ZONE)?.face(0))
    }

    /// Read `Zones <n>` and that many geometry records, then pair each
    /// zone with its state record from the material reader.
    pub fn load(
        geometry: &mut TokenReader,
        material: &mut TokenReader,
    ) -> Result<Self, GeometryError> {
        let mut mesh = Self::load_geometry(geometry)?;
        for zone in &mut mesh.zones {
            zone.load_mat(material)?;
        }
        Ok(mesh)
    }

    /// Geometry only; zone states are applied separately.
    pub fn load_geometry(geometry: &mut TokenReader) -> Result<Self, GeometryError> {
        geometry.find_word("Zones")?;
        let n: usize = geometry.next("zone count")?;
        let mut zones = Vec::with_capacity(n);
        for _ in 0..n {
            zones.push(Zone::load_geo(geometry)?);
        }
        Ok(Self { zones })
    }

    pub fn zone_mut(&mut self, i: usize) -> Result<&mut Zone, GeometryError> {
        let size = self.zones.len();
        self.zones
            .get_mut(i)
            .ok_or(GeometryError::MissingZone { zone: i, size })
    }
}
