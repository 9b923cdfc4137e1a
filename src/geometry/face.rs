// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The [Face] capability set shared by all bounding-surface variants, face
//! identity ([FaceId]), and the ray-hit record ([Intercept]).

use super::grid::Grid;
use super::vector::Vector3d;
use crate::constants::BIG;
use crate::io::{IoError, TokenReader};
use crate::math::{sign_eqt, QuadRoots};

/// Identity of a face: owning zone plus a small index within the zone.
/// Negative indices are reserved: -1 marks the sub-faces of a composite
/// [super::Surface], -2 is unset, -3 is the "no face yet" sentinel a ray
/// starts from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceId {
    pub zone: usize,
    pub face: i16,
}

impl FaceId {
    pub const SUBFACE: i16 = -1;
    pub const UNSET: i16 = -2;
    pub const RAY_START: i16 = -3;

    /// The face of zone 0 that launches every ray.
    pub const BOUNDING_SPHERE: FaceId = FaceId { zone: 0, face: 0 };

    pub const fn new(zone: usize, face: i16) -> Self {
        Self { zone, face }
    }
}

/// Result of a ray/face intersection query.
#[derive(Clone, Copy, Debug)]
pub struct Intercept {
    /// Ray parameter of the hit; -BIG when not found.
    pub t: f64,
    /// Hit point `p + t u`.
    pub w: Vector3d,
    /// The face that was hit.
    pub fid: FaceId,
    pub is_found: bool,
}

impl Intercept {
    pub fn not_found(fid: FaceId) -> Self {
        Self {
            t: -BIG,
            w: Vector3d::big_sentinel(),
            fid,
            is_found: false,
        }
    }
}

impl Default for Intercept {
    fn default() -> Self {
        Self::not_found(FaceId::new(0, FaceId::UNSET))
    }
}

/// Data common to every face variant: identity, vertex indices into the
/// [Grid], and the faces on the other side.
#[derive(Clone, Debug, Default)]
pub struct FaceCore {
    pub my_zone: usize,
    pub my_id: i16,
    pub nodes: Vec<usize>,
    pub neighbors: Vec<FaceId>,
}

impl FaceCore {
    pub fn new(my_zone: usize, my_id: i16) -> Self {
        Self {
            my_zone,
            my_id,
            nodes: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    pub fn fid(&self) -> FaceId {
        FaceId::new(self.my_zone, self.my_id)
    }

    /// Read `<zone> <face>`, `nnodes` node ids, then the neighbor list.
    /// A node count of `None` means the count precedes the ids in the file.
    pub fn load(r: &mut TokenReader, nnodes: Option<usize>) -> Result<Self, IoError> {
        let my_zone: usize = r.next("face zone id")?;
        let my_id: i16 = r.next("face index")?;
        let mut core = FaceCore::new(my_zone, my_id);
        let n = match nnodes {
            Some(n) => n,
            None => r.next("node count")?,
        };
        for _ in 0..n {
            core.nodes.push(r.next("node id")?);
        }
        Ok(core)
    }

    pub fn load_neighbors(&mut self, r: &mut TokenReader) -> Result<(), IoError> {
        r.find_word("neighbors")?;
        let n: usize = r.next("neighbor count")?;
        for _ in 0..n {
            let zone: usize = r.next("neighbor zone")?;
            let face: i16 = r.next("neighbor face")?;
            self.neighbors.push(FaceId::new(zone, face));
        }
        Ok(())
    }
}

pub type FacePtr = Box<dyn Face>;

pub trait Face: Send + Sync {
    fn core(&self) -> &FaceCore;

    fn is_curved(&self, g: &Grid) -> bool;

    /// Twice the outward-oriented area vector, and the face's centroid.
    fn area2_normal_center(&self, g: &Grid) -> (Vector3d, Vector3d);

    /// Signed distance from the face along its orientation.
    fn distance(&self, g: &Grid, w: Vector3d) -> f64;

    /// Foot of the perpendicular (or radial projection) of `w` on the face.
    fn subpoint(&self, g: &Grid, w: Vector3d) -> Vector3d;

    /// A representative on-face point near `w`, usable as a restart origin
    /// when a ray sits on this face.
    fn face_point(&self, g: &Grid, w: Vector3d) -> Vector3d;

    /// Whether `w` lies within the face's boundary (after projection onto
    /// the face).
    fn contains(&self, g: &Grid, w: Vector3d) -> bool;

    /// First valid intersection of the ray `p + t u` with this face, given
    /// the face the ray currently sits on.
    fn intercept(&self, g: &Grid, p: Vector3d, u: Vector3d, eqt: f64, from: FaceId) -> Intercept;

    /// Material velocity at the on-face point `w`, interpolated from the
    /// face's nodes.
    fn velocity(&self, g: &Grid, w: Vector3d) -> Vector3d;

    fn fid(&self) -> FaceId {
        self.core().fid()
    }

    fn my_zone(&self) -> usize {
        self.core().my_zone
    }

    fn my_id(&self) -> i16 {
        self.core().my_id
    }

    fn nodes(&self) -> &[usize] {
        &self.core().nodes
    }

    fn neighbors(&self) -> &[FaceId] {
        &self.core().neighbors
    }

    fn normal(&self, g: &Grid) -> Vector3d {
        self.area2_normal_center(g).0.unit()
    }

    fn area(&self, g: &Grid) -> f64 {
        self.area2_normal_center(g).0.norm() / 2.0
    }

    fn center(&self, g: &Grid) -> Vector3d {
        self.area2_normal_center(g).1
    }

    fn has_above(&self, g: &Grid, w: Vector3d) -> bool {
        self.distance(g, w) > 0.0
    }

    fn has_below(&self, g: &Grid, w: Vector3d) -> bool {
        self.distance(g, w) < 0.0
    }
}

/// Root selection shared by the curved faces (cone, sphere).
///
/// Keeps only roots with a positive tolerant sign whose hit point the face
/// contains. With one survivor it wins outright; with two, the nearer one
/// wins unless the ray starts on this very face, in which case the ray is
/// leaving and the farther root is the true exit.
pub(crate) fn choose_root<C>(
    roots: QuadRoots,
    p: Vector3d,
    u: Vector3d,
    eqt: f64,
    from: FaceId,
    fid: FaceId,
    contains: C,
) -> Intercept
where
    C: Fn(Vector3d) -> bool,
{
    let mut rv = Intercept::not_found(fid);
    if roots.nroots == 0 {
        return rv;
    }

    // ascending: x2 <= x1
    let roots_asc = [roots.x2, roots.x1];
    let candidates: &[f64] = if roots.nroots == 1 {
        &roots_asc[1..]
    } else {
        &roots_asc[..]
    };

    let mut hits: Vec<(f64, Vector3d)> = Vec::with_capacity(2);
    for &t in candidates {
        if sign_eqt(t, eqt) != 1 {
            continue;
        }
        let w = p + u * t;
        if contains(w) {
            hits.push((t, w));
        }
    }

    match hits.as_slice() {
        [] => {}
        [(t, w)] => {
            rv.t = *t;
            rv.w = *w;
            rv.is_found = true;
        }
        [(t_near, w_near), (t_far, w_far)] => {
            let leaving = from == fid;
            let (t, w) = if leaving { (t_far, w_far) } else { (t_near, w_near) };
            rv.t = *t;
            rv.w = *w;
            rv.is_found = true;
        }
        _ => unreachable!("a quadratic has at most two roots"),
    }
    rv
}
