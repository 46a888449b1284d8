//! The RISC-5 floating-point unit and the signed division helper.
//!
//! The float format is 1 sign bit, 8 exponent bits (biased 127), 23 fraction
//! bits, superficially like IEEE single precision. The resemblance stops
//! there: the hardware truncates instead of rounding to nearest, flushes
//! subnormals to zero, and never traps. These routines reproduce the FPGA
//! datapath bit for bit, including its treatment of the `u`/`v` modifier
//! bits on add (integer-to-float and float-to-integer conversion paths).

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

/// Floating-point add. `u` and `v` select the conversion variants used by
/// the FLT/FLR pseudo-instructions.
#[must_use]
pub fn fp_add(x: u32, y: u32, u: bool, v: bool) -> u32 {
    let xs = (x & 0x8000_0000) != 0;
    let xe: u32;
    let x0: i32;
    if !u {
        xe = (x >> 23) & 0xFF;
        let xm = ((x & 0x7F_FFFF) << 1) | 0x100_0000;
        x0 = if xs {
            (xm as i32).wrapping_neg()
        } else {
            xm as i32
        };
    } else {
        xe = 150;
        x0 = ((x & 0x00FF_FFFF) << 8) as i32 >> 7;
    }

    let ys = (y & 0x8000_0000) != 0;
    let ye = (y >> 23) & 0xFF;
    let mut ym = (y & 0x7F_FFFF) << 1;
    if !u && !v {
        ym |= 0x100_0000;
    }
    let y0 = if ys {
        (ym as i32).wrapping_neg()
    } else {
        ym as i32
    };

    // Align the smaller operand to the larger exponent.
    let e0: u32;
    let x3: i32;
    let y3: i32;
    if ye > xe {
        let shift = ye - xe;
        e0 = ye;
        x3 = if shift > 31 { x0 >> 31 } else { x0 >> shift };
        y3 = y0;
    } else {
        let shift = xe - ye;
        e0 = xe;
        x3 = x0;
        y3 = if shift > 31 { y0 >> 31 } else { y0 >> shift };
    }

    let xsb = u32::from(xs);
    let ysb = u32::from(ys);
    let sum = ((xsb << 26) | (xsb << 25) | (x3 as u32 & 0x01FF_FFFF))
        .wrapping_add((ysb << 26) | (ysb << 25) | (y3 as u32 & 0x01FF_FFFF));

    let s = (if sum & (1 << 26) != 0 {
        (sum as i32).wrapping_neg() as u32
    } else {
        sum
    })
    .wrapping_add(1)
        & 0x07FF_FFFF;

    // Normalize.
    let mut e1 = e0.wrapping_add(1);
    let mut t3 = s >> 1;
    if (s & 0x3FF_FFFC) != 0 {
        while (t3 & (1 << 24)) == 0 {
            t3 <<= 1;
            e1 = e1.wrapping_sub(1);
        }
    } else {
        t3 <<= 24;
        e1 = e1.wrapping_sub(24);
    }

    let xn = (x & 0x7FFF_FFFF) == 0;
    let yn = (y & 0x7FFF_FFFF) == 0;

    if v {
        ((sum << 5) as i32 >> 6) as u32
    } else if xn {
        if u || yn {
            0
        } else {
            y
        }
    } else if yn {
        x
    } else if (t3 & 0x01FF_FFFF) == 0 || (e1 & 0x100) != 0 {
        0
    } else {
        ((sum & 0x0400_0000) << 5) | (e1 << 23) | ((t3 >> 1) & 0x7F_FFFF)
    }
}

/// Floating-point multiply.
#[must_use]
pub fn fp_mul(x: u32, y: u32) -> u32 {
    let sign = (x ^ y) & 0x8000_0000;
    let xe = (x >> 23) & 0xFF;
    let ye = (y >> 23) & 0xFF;

    let xm = (x & 0x7F_FFFF) | 0x80_0000;
    let ym = (y & 0x7F_FFFF) | 0x80_0000;
    let m = u64::from(xm) * u64::from(ym);

    let mut e1 = (xe + ye).wrapping_sub(127);
    let z0: u32;
    if m & (1 << 47) != 0 {
        e1 = e1.wrapping_add(1);
        z0 = (((m >> 23) as u32).wrapping_add(1)) & 0xFF_FFFF;
    } else {
        z0 = (((m >> 22) as u32).wrapping_add(1)) & 0xFF_FFFF;
    }

    if xe == 0 || ye == 0 {
        0
    } else if (e1 & 0x100) == 0 {
        sign | ((e1 & 0xFF) << 23) | (z0 >> 1)
    } else if (e1 & 0x80) == 0 {
        // Overflow saturates the exponent.
        sign | (0xFF << 23) | (z0 >> 1)
    } else {
        0
    }
}

/// Floating-point divide. Division by zero yields the saturated-exponent
/// canonical result; no trap.
#[must_use]
pub fn fp_div(x: u32, y: u32) -> u32 {
    let sign = (x ^ y) & 0x8000_0000;
    let xe = (x >> 23) & 0xFF;
    let ye = (y >> 23) & 0xFF;

    let xm = (x & 0x7F_FFFF) | 0x80_0000;
    let ym = (y & 0x7F_FFFF) | 0x80_0000;
    let q1 = (u64::from(xm) * (1 << 25) / u64::from(ym)) as u32;

    let mut e1 = xe.wrapping_sub(ye).wrapping_add(126);
    let q2: u32;
    if q1 & (1 << 25) != 0 {
        e1 = e1.wrapping_add(1);
        q2 = (q1 >> 1) & 0xFF_FFFF;
    } else {
        q2 = q1 & 0xFF_FFFF;
    }
    let q3 = q2.wrapping_add(1);

    if xe == 0 {
        0
    } else if ye == 0 {
        sign | (0xFF << 23)
    } else if (e1 & 0x100) == 0 {
        sign | ((e1 & 0xFF) << 23) | (q3 >> 1)
    } else if (e1 & 0x80) == 0 {
        sign | (0xFF << 23) | (q2 >> 1)
    } else {
        0
    }
}

/// Quotient and remainder as left behind by the hardware divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IDiv {
    pub quot: u32,
    pub rem: u32,
}

/// Restoring division, used by the DIV instruction whenever the divisor is
/// not a positive signed value.
///
/// For signed division of a negative dividend the result is adjusted to
/// floor semantics: the quotient rounds toward negative infinity and the
/// remainder is non-negative.
#[must_use]
pub fn idiv(x: u32, y: u32, signed_div: bool) -> IDiv {
    let sign = signed_div && (x as i32) < 0;
    let x0 = if sign { x.wrapping_neg() } else { x };

    let mut rq = u64::from(x0);
    for _ in 0..32 {
        let w0 = (rq >> 31) as u32;
        let w1 = w0.wrapping_sub(y);
        if (w1 as i32) < 0 {
            rq = (u64::from(w0) << 32) | ((rq & 0x7FFF_FFFF) << 1);
        } else {
            rq = (u64::from(w1) << 32) | ((rq & 0x7FFF_FFFF) << 1) | 1;
        }
    }

    let mut d = IDiv {
        quot: rq as u32,
        rem: (rq >> 32) as u32,
    };
    if sign {
        d.quot = d.quot.wrapping_neg();
        if d.rem != 0 {
            d.quot = d.quot.wrapping_sub(1);
            d.rem = y.wrapping_sub(d.rem);
        }
    }
    d
}
