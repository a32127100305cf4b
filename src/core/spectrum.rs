//! Discrete Fourier transforms used to build unitary atoms.
//!
//! Complex numbers are stored interleaved (re, im, re, im, ...). Power-of-two
//! lengths go through an in-place radix-2 Cooley-Tukey FFT; any other length
//! falls back to a direct O(n²) DFT. Atom generation is the only caller, so
//! neither path is on the per-timestep hot loop.

/// Spectrum of a real signal, interleaved, length `2 * input.len()`.
pub fn forward(input: &[f64]) -> Vec<f64> {
    let mut data = Vec::with_capacity(input.len() * 2);
    for &x in input {
        data.push(x);
        data.push(0.0);
    }
    transform(&mut data, input.len(), false);
    data
}

/// Inverse transform of an interleaved spectrum, keeping the real parts.
pub fn inverse_real(spectrum: &[f64]) -> Vec<f64> {
    let n = spectrum.len() / 2;
    let mut data = spectrum.to_vec();
    transform(&mut data, n, true);
    (0..n).map(|i| data[2 * i]).collect()
}

/// Project `v` onto the unitary manifold: every Fourier coefficient is
/// rescaled to magnitude 1, so the result has unit norm and its involution
/// is its exact convolution inverse.
pub fn make_unitary(v: &[f64]) -> Vec<f64> {
    let n = v.len();
    if n == 0 {
        return Vec::new();
    }
    let mut spec = forward(v);
    for k in 0..n {
        let re = spec[2 * k];
        let im = spec[2 * k + 1];
        let mag = (re * re + im * im).sqrt();
        if mag > 1e-12 {
            spec[2 * k] = re / mag;
            spec[2 * k + 1] = im / mag;
        } else {
            // X[k] and X[n-k] vanish together, so this keeps Hermitian symmetry.
            spec[2 * k] = 1.0;
            spec[2 * k + 1] = 0.0;
        }
    }
    inverse_real(&spec)
}

fn transform(data: &mut [f64], n: usize, inverse: bool) {
    assert_eq!(data.len(), 2 * n);
    if n <= 1 {
        return;
    }
    if n.is_power_of_two() {
        fft_radix2(data, n, inverse);
    } else {
        dft_direct(data, n, inverse);
    }
    if inverse {
        let scale = 1.0 / n as f64;
        for x in data.iter_mut() {
            *x *= scale;
        }
    }
}

fn fft_radix2(data: &mut [f64], n: usize, inverse: bool) {
    bit_reverse_permute(data, n);

    let sign = if inverse { 1.0 } else { -1.0 };
    let mut stage_len = 2;
    while stage_len <= n {
        let half = stage_len / 2;
        let angle = sign * core::f64::consts::TAU / stage_len as f64;

        for k in (0..n).step_by(stage_len) {
            for j in 0..half {
                let theta = angle * j as f64;
                let wr = theta.cos();
                let wi = theta.sin();

                let even_re = data[2 * (k + j)];
                let even_im = data[2 * (k + j) + 1];
                let odd_re = data[2 * (k + j + half)];
                let odd_im = data[2 * (k + j + half) + 1];

                let tr = wr * odd_re - wi * odd_im;
                let ti = wr * odd_im + wi * odd_re;

                data[2 * (k + j)] = even_re + tr;
                data[2 * (k + j) + 1] = even_im + ti;
                data[2 * (k + j + half)] = even_re - tr;
                data[2 * (k + j + half) + 1] = even_im - ti;
            }
        }
        stage_len *= 2;
    }
}

fn dft_direct(data: &mut [f64], n: usize, inverse: bool) {
    let sign = if inverse { 1.0 } else { -1.0 };
    let input = data.to_vec();
    for k in 0..n {
        let mut re = 0.0;
        let mut im = 0.0;
        for j in 0..n {
            // Reduce j*k mod n first to keep the angle small.
            let theta = sign * core::f64::consts::TAU * ((j * k) % n) as f64 / n as f64;
            let (s, c) = theta.sin_cos();
            let xr = input[2 * j];
            let xi = input[2 * j + 1];
            re += xr * c - xi * s;
            im += xr * s + xi * c;
        }
        data[2 * k] = re;
        data[2 * k + 1] = im;
    }
}

fn bit_reverse_permute(data: &mut [f64], n: usize) {
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = bit_reverse(i as u32, bits) as usize;
        if i < j {
            data.swap(2 * i, 2 * j);
            data.swap(2 * i + 1, 2 * j + 1);
        }
    }
}

fn bit_reverse(mut x: u32, bits: u32) -> u32 {
    let mut result = 0;
    for _ in 0..bits {
        result = (result << 1) | (x & 1);
        x >>= 1;
    }
    result
}
