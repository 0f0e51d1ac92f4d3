// Space view widget
// Draws avatars in a 2D top-down representation of the shared space

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Widget},
};

use crate::scene::{AvatarSprite, GROUND_EXTENT};

pub struct SpaceView<'a> {
    block: Option<Block<'a>>,
    sprites: &'a [AvatarSprite],
    bounds: ((f32, f32), (f32, f32)), // ((min_x, min_z), (max_x, max_z))
}

impl<'a> SpaceView<'a> {
    pub fn new(sprites: &'a [AvatarSprite]) -> Self {
        Self {
            block: None,
            sprites,
            bounds: (
                (-GROUND_EXTENT, -GROUND_EXTENT),
                (GROUND_EXTENT, GROUND_EXTENT),
            ),
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn bounds(mut self, min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> Self {
        self.bounds = ((min_x, min_z), (max_x, max_z));
        self
    }
}

impl<'a> Widget for SpaceView<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = self.block.unwrap_or_else(Block::default);
        let inner_area = block.inner(area);
        block.render(area, buf);

        if inner_area.width < 3 || inner_area.height < 3 {
            return;
        }

        // Map from world coordinates to screen cells; X runs along the
        // columns, Z along the rows.
        let ((min_x, min_z), (max_x, max_z)) = self.bounds;
        let x_scale = inner_area.width as f32 / (max_x - min_x);
        let z_scale = inner_area.height as f32 / (max_z - min_z);

        for sprite in self.sprites {
            let column = ((sprite.position.x - min_x) * x_scale) as u16;
            let row = ((sprite.position.z - min_z) * z_scale) as u16;

            let x = inner_area.left() + column.min(inner_area.width - 1);
            let y = inner_area.top() + row.min(inner_area.height - 1);

            let (symbol, style) = if sprite.local {
                ("@", Style::default().fg(Color::Cyan))
            } else {
                ("●", Style::default().fg(Color::White))
            };

            if x < inner_area.right() && y < inner_area.bottom() {
                buf.get_mut(x, y).set_style(style);
                buf.get_mut(x, y).set_symbol(symbol);
            }
        }
    }
}
