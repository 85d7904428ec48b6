use ndarray::{Array2, ArrayView2};

/// One connected blob of above-threshold pixels.
#[derive(Clone, Debug)]
pub struct Component {
    /// Root label; lower labels were reached earlier in raster order.
    pub label: u32,
    /// Number of pixels in the component.
    pub area: usize,
    /// Bounding box: (min_row, max_row, min_col, max_col).
    pub bbox: (usize, usize, usize, usize),
    /// Sum of background-subtracted values.
    pub flux: f64,
    /// Brightest raw pixel value.
    pub peak: f32,
    /// Flux-weighted centroid (row, col).
    pub centroid: (f64, f64),
}

/// Label a binary mask using two-pass labeling with union-find and
/// 4-connectivity (left and upper neighbors).
///
/// Components come back in detection order: by the raster position of
/// their first pixel.
pub fn connected_components(
    mask: &Array2<bool>,
    data: &ArrayView2<'_, f32>,
    background: f32,
) -> Vec<Component> {
    let (h, w) = mask.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    let mut labels = Array2::<u32>::zeros((h, w));
    let mut next_label: u32 = 1;
    // Union-find parent array. Index 0 unused; labels start at 1.
    let mut parent: Vec<u32> = vec![0; h * w / 2 + 2];

    // Pass 1: assign provisional labels.
    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }

            let up = if row > 0 { labels[[row - 1, col]] } else { 0 };
            let left = if col > 0 { labels[[row, col - 1]] } else { 0 };

            labels[[row, col]] = match (up > 0, left > 0) {
                (false, false) => {
                    if next_label as usize >= parent.len() {
                        parent.resize(parent.len() * 2, 0);
                    }
                    parent[next_label as usize] = next_label;
                    next_label += 1;
                    next_label - 1
                }
                (true, false) => up,
                (false, true) => left,
                (true, true) => {
                    let smaller = up.min(left);
                    if up != left {
                        union(&mut parent, smaller, up.max(left));
                    }
                    smaller
                }
            };
        }
    }

    for i in 1..next_label as usize {
        parent[i] = find(&parent, i as u32);
    }

    // Pass 2: resolve labels and accumulate per-component sums.
    struct Acc {
        area: usize,
        bbox: (usize, usize, usize, usize),
        flux: f64,
        peak: f32,
        sum_r: f64,
        sum_c: f64,
    }
    let mut accs = std::collections::BTreeMap::<u32, Acc>::new();

    for row in 0..h {
        for col in 0..w {
            let lbl = labels[[row, col]];
            if lbl == 0 {
                continue;
            }
            let root = parent[lbl as usize];
            let v = data[[row, col]];
            let weight = (v - background).max(0.0) as f64;

            let acc = accs.entry(root).or_insert(Acc {
                area: 0,
                bbox: (row, row, col, col),
                flux: 0.0,
                peak: v,
                sum_r: 0.0,
                sum_c: 0.0,
            });
            acc.area += 1;
            acc.bbox.0 = acc.bbox.0.min(row);
            acc.bbox.1 = acc.bbox.1.max(row);
            acc.bbox.2 = acc.bbox.2.min(col);
            acc.bbox.3 = acc.bbox.3.max(col);
            acc.flux += weight;
            acc.peak = acc.peak.max(v);
            acc.sum_r += weight * row as f64;
            acc.sum_c += weight * col as f64;
        }
    }

    accs.into_iter()
        .map(|(label, acc)| {
            let centroid = if acc.flux > 0.0 {
                (acc.sum_r / acc.flux, acc.sum_c / acc.flux)
            } else {
                (
                    (acc.bbox.0 + acc.bbox.1) as f64 / 2.0,
                    (acc.bbox.2 + acc.bbox.3) as f64 / 2.0,
                )
            };
            Component {
                label,
                area: acc.area,
                bbox: acc.bbox,
                flux: acc.flux,
                peak: acc.peak,
                centroid,
            }
        })
        .collect()
}

/// Returns true if the component's bounding box touches any edge of the image.
pub fn touches_border(bbox: (usize, usize, usize, usize), height: usize, width: usize) -> bool {
    let (min_row, max_row, min_col, max_col) = bbox;
    min_row == 0 || max_row >= height - 1 || min_col == 0 || max_col >= width - 1
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Merge larger root into smaller root to keep labels consistent.
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}
