// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [Node] and [Grid]: the dense, zero-based store of mesh vertices and
//! their velocities, reloaded at every hydro snapshot.

use super::vector::Vector3d;
use super::GeometryError;
use crate::io::TokenReader;

/// A mesh vertex: position and material velocity at one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Node {
    pub id: usize,
    pub r: Vector3d,
    pub v: Vector3d,
}

impl Node {
    pub fn new(id: usize, r: Vector3d, v: Vector3d) -> Self {
        Self { id, r, v }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Grid {
    nodes: Vec<Node>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, n: Node) {
        self.nodes.push(n);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, i: usize) -> Result<&Node, GeometryError> {
        self.nodes.get(i).ok_or(GeometryError::MissingNode {
            node: i,
            size: self.nodes.len(),
        })
    }

    /// Position of node `i`; panics on a dangling index, which the mesh
    /// loader has already ruled out.
    pub fn point(&self, i: usize) -> Vector3d {
        self.nodes[i].r
    }

    pub fn velocity(&self, i: usize) -> Vector3d {
        self.nodes[i].v
    }

    /// Read `Node <count>` then per node: id, position, velocity.
    pub fn load(r: &mut TokenReader) -> Result<Self, GeometryError> {
        r.find_word("Nodes")?;
        let n: usize = r.next("node count")?;
        let mut grid = Grid::new();
        for _ in 0..n {
            let id: usize = r.next("node id")?;
            let rx: f64 = r.next("node x")?;
            let ry: f64 = r.next("node y")?;
            let rz: f64 = r.next("node z")?;
            let vx: f64 = r.next("node vx")?;
            let vy: f64 = r.next("node vy")?;
            let vz: f64 = r.next("node vz")?;
            grid.add_node(Node::new(
                id,
                Vector3d::new(rx, ry, rz),
                Vector3d::new(vx, vy, vz),
            ));
        }
        Ok(grid)
    }
}
