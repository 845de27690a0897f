use palette::cast::ArrayCast;

/// Colors that can be viewed as an array of `N` components of type `Component`.
///
/// This is automatically implemented for any `palette` color type with an [`ArrayCast`]
/// (e.g., `Srgb<u8>` is a `ColorComponents<u8, 3>`).
pub trait ColorComponents<Component, const N: usize>:
    ArrayCast<Array = [Component; N]> + Copy + 'static
{
}

impl<Color, Component, const N: usize> ColorComponents<Component, N> for Color where
    Color: ArrayCast<Array = [Component; N]> + Copy + 'static
{
}
