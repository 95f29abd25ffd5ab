use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// RGBA 颜色：r/g/b 取值 0–255，alpha 取值 0–1。
///
/// `source` 保留颜色在源码中的写法（如 `#fff`、`red`），颜色未被修改时原样输出。
#[derive(Clone, Debug, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
    pub source: Option<String>,
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        let c1 = self.clamped();
        let c2 = other.clamped();
        to_channel(c1.r) == to_channel(c2.r)
            && to_channel(c1.g) == to_channel(c2.g)
            && to_channel(c1.b) == to_channel(c2.b)
            && (c1.a - c2.a).abs() < 1e-6
    }
}

static NAMED_COLORS: Lazy<IndexMap<&'static str, (u8, u8, u8)>> = Lazy::new(|| {
    IndexMap::from([
        ("black", (0, 0, 0)),
        ("silver", (192, 192, 192)),
        ("gray", (128, 128, 128)),
        ("grey", (128, 128, 128)),
        ("white", (255, 255, 255)),
        ("maroon", (128, 0, 0)),
        ("red", (255, 0, 0)),
        ("purple", (128, 0, 128)),
        ("fuchsia", (255, 0, 255)),
        ("green", (0, 128, 0)),
        ("lime", (0, 255, 0)),
        ("olive", (128, 128, 0)),
        ("yellow", (255, 255, 0)),
        ("navy", (0, 0, 128)),
        ("blue", (0, 0, 255)),
        ("teal", (0, 128, 128)),
        ("aqua", (0, 255, 255)),
        ("orange", (255, 165, 0)),
        ("pink", (255, 192, 203)),
        ("brown", (165, 42, 42)),
        ("gold", (255, 215, 0)),
    ])
});

impl Color {
    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r,
            g,
            b,
            a,
            source: None,
        }
        .clamped()
    }

    pub fn from_hsla(h: f64, s: f64, l: f64, a: f64) -> Self {
        hsl_to_rgb(h, s, l, a)
    }

    /// 解析 `#rgb`、`#rrggbb` 与 `#rrggbbaa`。
    pub fn from_hash(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#')?;
        let mut color = parse_hex(hex)?;
        color.source = Some(text.to_string());
        Some(color)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered == "transparent" {
            return Some(Self {
                source: Some(name.to_string()),
                ..Self::rgba(0.0, 0.0, 0.0, 0.0)
            });
        }
        let (r, g, b) = NAMED_COLORS.get(lowered.as_str())?;
        Some(Self {
            source: Some(name.to_string()),
            ..Self::rgba(f64::from(*r), f64::from(*g), f64::from(*b), 1.0)
        })
    }

    fn clamped(&self) -> Self {
        Self {
            r: self.r.clamp(0.0, 255.0),
            g: self.g.clamp(0.0, 255.0),
            b: self.b.clamp(0.0, 255.0),
            a: self.a.clamp(0.0, 1.0),
            source: self.source.clone(),
        }
    }

    /// 返回 (色相 0–1, 饱和度 0–1, 亮度 0–1)。
    pub fn to_hsl(&self) -> (f64, f64, f64) {
        rgb_to_hsl(self)
    }

    pub fn hue(&self) -> f64 {
        self.to_hsl().0 * 360.0
    }

    pub fn saturation(&self) -> f64 {
        self.to_hsl().1
    }

    pub fn lightness(&self) -> f64 {
        self.to_hsl().2
    }

    /// 感知亮度，用于 `contrast()`。
    pub fn luma(&self) -> f64 {
        (0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b) / 255.0
    }

    pub fn to_hex(&self) -> String {
        let c = self.clamped();
        format!(
            "#{:02x}{:02x}{:02x}",
            to_channel(c.r),
            to_channel(c.g),
            to_channel(c.b)
        )
    }

    pub fn to_argb(&self) -> String {
        let c = self.clamped();
        format!(
            "#{:02x}{:02x}{:02x}{:02x}",
            to_channel(c.a * 255.0),
            to_channel(c.r),
            to_channel(c.g),
            to_channel(c.b)
        )
    }

    pub fn to_rgba(&self) -> String {
        let c = self.clamped();
        format!(
            "rgba({}, {}, {}, {})",
            to_channel(c.r),
            to_channel(c.g),
            to_channel(c.b),
            format_float(c.a)
        )
    }

    /// 输出 CSS 文本：未修改时保留源码写法，不透明时输出十六进制，否则输出 `rgba()`。
    pub fn to_css(&self) -> String {
        if let Some(source) = &self.source {
            return source.clone();
        }
        if self.a >= 1.0 {
            self.to_hex()
        } else {
            self.to_rgba()
        }
    }

    /// 对每个通道应用运算，alpha 保持不变。
    pub fn map_channels<F>(&self, op: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self::rgba(op(self.r), op(self.g), op(self.b), self.a)
    }

    pub fn zip_channels<F>(&self, other: &Color, op: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        Self::rgba(
            op(self.r, other.r),
            op(self.g, other.g),
            op(self.b, other.b),
            self.a,
        )
    }
}

pub fn lighten(color: &Color, amount: f64) -> Color {
    let (h, s, l) = color.to_hsl();
    hsl_to_rgb(h, s, (l + amount).clamp(0.0, 1.0), color.a)
}

pub fn darken(color: &Color, amount: f64) -> Color {
    let (h, s, l) = color.to_hsl();
    hsl_to_rgb(h, s, (l - amount).clamp(0.0, 1.0), color.a)
}

pub fn saturate(color: &Color, amount: f64) -> Color {
    let (h, s, l) = color.to_hsl();
    hsl_to_rgb(h, (s + amount).clamp(0.0, 1.0), l, color.a)
}

pub fn desaturate(color: &Color, amount: f64) -> Color {
    let (h, s, l) = color.to_hsl();
    hsl_to_rgb(h, (s - amount).clamp(0.0, 1.0), l, color.a)
}

/// 旋转色相，`degrees` 为角度。
pub fn spin(color: &Color, degrees: f64) -> Color {
    let (h, s, l) = color.to_hsl();
    let hue = ((h * 360.0 + degrees) % 360.0 + 360.0) % 360.0;
    hsl_to_rgb(hue / 360.0, s, l, color.a)
}

pub fn fade(color: &Color, amount: f64) -> Color {
    Color {
        a: amount.clamp(0.0, 1.0),
        source: None,
        ..color.clone()
    }
}

pub fn fade_in(color: &Color, amount: f64) -> Color {
    fade(color, color.a + amount)
}

pub fn fade_out(color: &Color, amount: f64) -> Color {
    fade(color, color.a - amount)
}

/// 按权重混合两种颜色，`weight` 为第一种颜色所占比例（0–1）。
pub fn mix(first: &Color, second: &Color, weight: f64) -> Color {
    let p = weight.clamp(0.0, 1.0);
    let w = p * 2.0 - 1.0;
    let a = first.a - second.a;
    let w1 = if (w * a - -1.0).abs() < f64::EPSILON {
        (w + 1.0) / 2.0
    } else {
        ((w + a) / (1.0 + w * a) + 1.0) / 2.0
    };
    let w2 = 1.0 - w1;
    Color::rgba(
        first.r * w1 + second.r * w2,
        first.g * w1 + second.g * w2,
        first.b * w1 + second.b * w2,
        first.a * p + second.a * (1.0 - p),
    )
}

pub fn greyscale(color: &Color) -> Color {
    desaturate(color, 1.0)
}

/// 根据亮度阈值在深色与浅色之间选择对比色。
pub fn contrast(color: &Color, dark: &Color, light: &Color, threshold: f64) -> Color {
    let (dark, light) = if dark.luma() > light.luma() {
        (light, dark)
    } else {
        (dark, light)
    };
    if color.luma() < threshold {
        light.clone()
    } else {
        dark.clone()
    }
}

pub fn overlay(top: &Color, bottom: &Color) -> Color {
    color_blend(blend_overlay, top, bottom)
}

pub fn multiply(top: &Color, bottom: &Color) -> Color {
    color_blend(blend_multiply, top, bottom)
}

pub fn screen(top: &Color, bottom: &Color) -> Color {
    color_blend(blend_screen, top, bottom)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| hex_value(&hex[range]).map(f64::from);
    match hex.len() {
        3 => Some(Color::rgba(
            channel(0..1)? * 17.0,
            channel(1..2)? * 17.0,
            channel(2..3)? * 17.0,
            1.0,
        )),
        6 => Some(Color::rgba(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            1.0,
        )),
        8 => Some(Color::rgba(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            channel(6..8)? / 255.0,
        )),
        _ => None,
    }
}

fn color_blend<F>(mode: F, bottom: &Color, top: &Color) -> Color
where
    F: Fn(f64, f64) -> f64 + Copy,
{
    let ab = bottom.a;
    let at = top.a;
    let ar = at + ab * (1.0 - at);
    let bottom_channels = [bottom.r / 255.0, bottom.g / 255.0, bottom.b / 255.0];
    let top_channels = [top.r / 255.0, top.g / 255.0, top.b / 255.0];
    let mut result = [0.0; 3];
    for i in 0..3 {
        let cb = bottom_channels[i];
        let cs = top_channels[i];
        let mut cr = mode(cb, cs);
        if ar > 0.0 {
            cr = (at * cs + ab * (cb - at * (cb + cs - cr))) / ar;
        }
        result[i] = cr * 255.0;
    }
    Color::rgba(result[0], result[1], result[2], ar)
}

fn blend_multiply(a: f64, b: f64) -> f64 {
    a * b
}

fn blend_screen(a: f64, b: f64) -> f64 {
    a + b - a * b
}

fn blend_overlay(base: f64, overlay: f64) -> f64 {
    if base <= 0.5 {
        blend_multiply(base * 2.0, overlay)
    } else {
        blend_screen(base * 2.0 - 1.0, overlay)
    }
}

fn hex_value(hex: &str) -> Option<u8> {
    u8::from_str_radix(hex, 16).ok()
}

fn rgb_to_hsl(color: &Color) -> (f64, f64, f64) {
    let c = color.clamped();
    let r = c.r / 255.0;
    let g = c.g / 255.0;
    let b = c.b / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } / 6.0;

    (h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64, alpha: f64) -> Color {
    if s <= 0.0 {
        return Color::rgba(l * 255.0, l * 255.0, l * 255.0, alpha);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    Color::rgba(r * 255.0, g * 255.0, b * 255.0, alpha)
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    match t {
        _ if t < 1.0 / 6.0 => p + (q - p) * 6.0 * t,
        _ if t < 1.0 / 2.0 => q,
        _ if t < 2.0 / 3.0 => p + (q - p) * (2.0 / 3.0 - t) * 6.0,
        _ => p,
    }
}

fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// 去掉多余的小数零，最多保留 4 位小数。
pub fn format_float(value: f64) -> String {
    let value = if value.abs() < 1e-9 { 0.0 } else { value };
    let mut formatted = format!("{value:.4}");
    while formatted.contains('.') && formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    if formatted.is_empty() || formatted == "-0" {
        "0".to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(text: &str) -> Color {
        Color::from_hash(text).unwrap()
    }

    #[test]
    fn lighten_and_darken_follow_hsl() {
        assert_eq!(lighten(&hex("#336699"), 0.2).to_css(), "#6699cc");
        assert_eq!(darken(&hex("#336699"), 0.1).to_css(), "#264c73");
    }

    #[test]
    fn darken_lowers_lightness() {
        let base = hex("#808080");
        let darker = darken(&base, 0.1);
        assert!(darker.lightness() < base.lightness());
        assert_eq!(darker.to_css(), darken(&base, 0.1).to_css());
    }

    #[test]
    fn unmodified_colors_keep_their_spelling() {
        assert_eq!(hex("#FFF").to_css(), "#FFF");
        assert_eq!(Color::from_name("red").unwrap().to_css(), "red");
        assert_eq!(fade(&hex("#ffffff"), 0.4).to_css(), "rgba(255, 255, 255, 0.4)");
    }

    #[test]
    fn spin_wraps_around() {
        let red = Color::rgba(255.0, 0.0, 0.0, 1.0);
        assert_eq!(spin(&red, 120.0).to_hex(), "#00ff00");
        assert_eq!(spin(&red, -120.0).to_hex(), "#0000ff");
    }

    #[test]
    fn mix_is_weighted_average() {
        let mixed = mix(&hex("#ff0000"), &hex("#0000ff"), 0.5);
        assert_eq!(mixed.to_hex(), "#800080");
    }

    #[test]
    fn overlay_blends_like_reference_values() {
        let top = Color::rgba(255.0, 255.0, 255.0, 0.05);
        let bottom = hex("#2c2c2c");
        assert_eq!(overlay(&top, &bottom).to_hex(), "#373737");
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(Color::from_hash("#main").is_none());
        assert!(Color::from_hash("#abcd").is_none());
    }
}
