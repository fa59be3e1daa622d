use crate::error::{GaugeError, Result};
use crate::geometry::{LatticeGeometry, Step};
use crate::random::random_su3;
use crate::su3::{reunitarize, unitarity_deviation, CMatrix3};
use rand::Rng;
use rayon::prelude::*;
use std::marker::PhantomData;

/// Read access to link matrices by link index.
pub trait LinkSource {
    fn link(&self, index: usize) -> CMatrix3;

    /// Ordered product of links along `steps`, starting at `start_site`.
    fn path_product(&self, geometry: &LatticeGeometry, start_site: usize, steps: &[Step]) -> CMatrix3 {
        let mut site = start_site;
        let mut acc = CMatrix3::identity();
        for step in steps {
            if step.forward {
                acc *= self.link(site * 4 + step.dim);
                site = geometry.neighbor_site(site, step.dim, true);
            } else {
                site = geometry.neighbor_site(site, step.dim, false);
                acc *= self.link(site * 4 + step.dim).adjoint();
            }
        }
        acc
    }
}

impl LinkSource for [CMatrix3] {
    #[inline]
    fn link(&self, index: usize) -> CMatrix3 {
        self[index]
    }
}

/// The gauge configuration: one SU(3) matrix per link.
#[derive(Debug, Clone)]
pub struct GaugeField {
    links: Vec<CMatrix3>,
}

impl GaugeField {
    /// Every link set to the identity.
    pub fn cold(n_links: usize) -> Self {
        Self {
            links: vec![CMatrix3::identity(); n_links],
        }
    }

    /// Every link drawn independently at random.
    pub fn hot<R: Rng>(n_links: usize, rng: &mut R) -> Self {
        Self {
            links: (0..n_links).map(|_| random_su3(rng)).collect(),
        }
    }

    pub fn from_links(links: Vec<CMatrix3>) -> Self {
        Self { links }
    }

    pub fn n_links(&self) -> usize {
        self.links.len()
    }

    pub fn get(&self, index: usize) -> Result<&CMatrix3> {
        self.links.get(index).ok_or(GaugeError::IndexOutOfRange {
            index,
            n_links: self.links.len(),
        })
    }

    pub fn set(&mut self, index: usize, matrix: CMatrix3) -> Result<()> {
        let n_links = self.links.len();
        let slot = self
            .links
            .get_mut(index)
            .ok_or(GaugeError::IndexOutOfRange { index, n_links })?;
        *slot = matrix;
        Ok(())
    }

    pub fn links(&self) -> &[CMatrix3] {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut [CMatrix3] {
        &mut self.links
    }

    /// Project every link back onto SU(3).
    pub fn reunitarize(&mut self) {
        self.links.par_iter_mut().for_each(|u| *u = reunitarize(u));
    }

    /// Largest [`unitarity_deviation`] over all links.
    pub fn max_unitarity_deviation(&self) -> f64 {
        self.links
            .par_iter()
            .map(unitarity_deviation)
            .reduce(|| 0.0, f64::max)
    }
}

impl LinkSource for GaugeField {
    #[inline]
    fn link(&self, index: usize) -> CMatrix3 {
        self.links[index]
    }
}

/// Mutable access to a link array that may be shared with other block tasks.
///
/// A view reads and writes single links by value and never hands out
/// references, so concurrent views over one array stay sound as long as no
/// two of them touch the same link while one is writing it.
pub struct LinkView<'a> {
    ptr: *mut CMatrix3,
    len: usize,
    _marker: PhantomData<&'a mut [CMatrix3]>,
}

impl<'a> LinkView<'a> {
    pub fn new(links: &'a mut [CMatrix3]) -> Self {
        Self {
            ptr: links.as_mut_ptr(),
            len: links.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for `len` links for `'a`, and no other access may
    /// read or write a link while this view writes it.
    pub(crate) unsafe fn from_raw(ptr: *mut CMatrix3, len: usize) -> Self {
        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn set(&mut self, index: usize, matrix: CMatrix3) {
        assert!(index < self.len, "link {index} out of range ({})", self.len);
        // SAFETY: in bounds, and exclusive for this link per the view contract.
        unsafe { self.ptr.add(index).write(matrix) }
    }
}

impl LinkSource for LinkView<'_> {
    #[inline]
    fn link(&self, index: usize) -> CMatrix3 {
        assert!(index < self.len, "link {index} out of range ({})", self.len);
        // SAFETY: in bounds, and not concurrently written per the view contract.
        unsafe { self.ptr.add(index).read() }
    }
}
