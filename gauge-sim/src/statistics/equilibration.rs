/// Running averages up to one checkpoint sweep.
#[derive(Debug, Clone)]
pub struct EquilCheckpoint {
    pub sweep: usize,
    pub plaquette_avg: f64,
    pub rectangle_avg: f64,
}

/// Records cumulative averages at sweeps 128, 256, 512, … and at the last
/// sweep, to judge whether warmup was long enough.
pub struct EquilDiagnosticAccum {
    checkpoints: Vec<usize>,
    next_ckpt_idx: usize,
    count: usize,
    sum_plaquette: f64,
    sum_rectangle: f64,
    snapshots: Vec<EquilCheckpoint>,
}

impl EquilDiagnosticAccum {
    pub fn new(n_sweeps: usize) -> Self {
        let mut checkpoints = Vec::new();
        let mut p = 128usize;
        while p < n_sweeps {
            checkpoints.push(p);
            p *= 2;
        }
        if checkpoints.last() != Some(&n_sweeps) {
            checkpoints.push(n_sweeps);
        }

        Self {
            checkpoints,
            next_ckpt_idx: 0,
            count: 0,
            sum_plaquette: 0.0,
            sum_rectangle: 0.0,
            snapshots: Vec::new(),
        }
    }

    pub fn push(&mut self, plaquette: f64, rectangle: f64) {
        self.count += 1;
        self.sum_plaquette += plaquette;
        self.sum_rectangle += rectangle;

        if self.next_ckpt_idx < self.checkpoints.len()
            && self.count == self.checkpoints[self.next_ckpt_idx]
        {
            let c = self.count as f64;
            self.snapshots.push(EquilCheckpoint {
                sweep: self.count,
                plaquette_avg: self.sum_plaquette / c,
                rectangle_avg: self.sum_rectangle / c,
            });
            self.next_ckpt_idx += 1;
        }
    }

    pub fn finish(self) -> Vec<EquilCheckpoint> {
        self.snapshots
    }
}
