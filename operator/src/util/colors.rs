use owo_colors::Rgb;

pub(crate) const FG1_COLOR: Rgb = Rgb(92, 196, 156);
pub(crate) const FG2_COLOR: Rgb = Rgb(210, 160, 60);
