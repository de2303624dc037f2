/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Saturating PCM16 mixing of two sample streams.
//!
//! The SIMD paths process 8 samples per step with hardware saturating
//! adds and must stay bit-exact with the scalar path for every input;
//! the tests enforce it.

/// Mixes `src1 + src2` into `dst` with each sample clamped to the i16
/// range. `dst` may alias neither source slice but may be longer; only
/// `src1.len()` samples are produced.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn mix_saturating(src1: &[i16], src2: &[i16], dst: &mut [i16]) {
    assert_eq!(src1.len(), src2.len());
    assert!(dst.len() >= src1.len());

    #[cfg(target_arch = "x86_64")]
    {
        // SSE2 is part of the x86_64 baseline
        unsafe { mix_sse2(src1, src2, dst) }
        return;
    }
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { mix_neon(src1, src2, dst) }
        return;
    }
    #[allow(unreachable_code)]
    mix_scalar(src1, src2, dst);
}

/// The scalar reference path; the SIMD paths must match it bit for bit.
pub fn mix_scalar(src1: &[i16], src2: &[i16], dst: &mut [i16]) {
    for ((a, b), out) in src1.iter().zip(src2.iter()).zip(dst.iter_mut()) {
        *out = a.saturating_add(*b);
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn mix_sse2(src1: &[i16], src2: &[i16], dst: &mut [i16]) {
    use core::arch::x86_64::*;
    let count = src1.len();
    let mut i = 0;
    // 8 samples (128 bits) per step
    while i + 8 <= count {
        let v1 = _mm_loadu_si128(src1.as_ptr().add(i) as *const __m128i);
        let v2 = _mm_loadu_si128(src2.as_ptr().add(i) as *const __m128i);
        let res = _mm_adds_epi16(v1, v2);
        _mm_storeu_si128(dst.as_mut_ptr().add(i) as *mut __m128i, res);
        i += 8;
    }
    // a 4-sample (64 bit) step covers the common 1764 % 8 == 4 tail
    if i + 4 <= count {
        let v1 = _mm_loadl_epi64(src1.as_ptr().add(i) as *const __m128i);
        let v2 = _mm_loadl_epi64(src2.as_ptr().add(i) as *const __m128i);
        let res = _mm_adds_epi16(v1, v2);
        _mm_storel_epi64(dst.as_mut_ptr().add(i) as *mut __m128i, res);
        i += 4;
    }
    mix_scalar(&src1[i..], &src2[i..], &mut dst[i..]);
}

#[cfg(target_arch = "aarch64")]
unsafe fn mix_neon(src1: &[i16], src2: &[i16], dst: &mut [i16]) {
    use core::arch::aarch64::*;
    let count = src1.len();
    let mut i = 0;
    while i + 8 <= count {
        let v1 = vld1q_s16(src1.as_ptr().add(i));
        let v2 = vld1q_s16(src2.as_ptr().add(i));
        let res = vqaddq_s16(v1, v2);
        vst1q_s16(dst.as_mut_ptr().add(i), res);
        i += 8;
    }
    if i + 4 <= count {
        let v1 = vld1_s16(src1.as_ptr().add(i));
        let v2 = vld1_s16(src2.as_ptr().add(i));
        let res = vqadd_s16(v1, v2);
        vst1_s16(dst.as_mut_ptr().add(i), res);
        i += 4;
    }
    mix_scalar(&src1[i..], &src2[i..], &mut dst[i..]);
}
