use bevy::prelude::*;

pub fn ray_hits_obb(origin: Vec3, dir: Vec3, xf: &Transform, size: Vec3) -> Option<f32> {
    let inv = xf.compute_matrix().inverse();
    let o_local = inv.transform_point3(origin);
    let d_local = inv.transform_vector3(dir);
    let he = size * 0.5;
    // t is measured in local units; map the hit back to world distance.
    let t_local = ray_aabb_hit_t(o_local, d_local, -he, he)?;
    let hit = xf.compute_matrix().transform_point3(o_local + d_local * t_local);
    Some(hit.distance(origin) / dir.length().max(f32::EPSILON))
}

// Slab-method ray–AABB intersection, returns Some(t) or None
pub fn ray_aabb_hit_t(ray_origin: Vec3, ray_direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = Vec3::new(
        if ray_direction.x != 0.0 { 1.0 / ray_direction.x } else { f32::INFINITY },
        if ray_direction.y != 0.0 { 1.0 / ray_direction.y } else { f32::INFINITY },
        if ray_direction.z != 0.0 { 1.0 / ray_direction.z } else { f32::INFINITY },
    );

    let (mut tmin, mut tmax) = slab(ray_origin.x, inv.x, min.x, max.x)?;

    let (tymin, tymax) = slab(ray_origin.y, inv.y, min.y, max.y)?;
    if (tmin > tymax) || (tymin > tmax) { return None; }
    tmin = tmin.max(tymin);
    tmax = tmax.min(tymax);

    let (tzmin, tzmax) = slab(ray_origin.z, inv.z, min.z, max.z)?;
    if (tmin > tzmax) || (tzmin > tmax) { return None; }
    tmin = tmin.max(tzmin);
    tmax = tmax.min(tzmax);

    if tmax < 0.0 { return None; }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

// Entry/exit distances for one axis. A ray parallel to the slab either lies
// inside it for all t or misses.
fn slab(origin: f32, inv_dir: f32, min: f32, max: f32) -> Option<(f32, f32)> {
    if inv_dir.is_infinite() {
        return if origin >= min && origin <= max {
            Some((f32::NEG_INFINITY, f32::INFINITY))
        } else {
            None
        };
    }
    let (a, b) = ((min - origin) * inv_dir, (max - origin) * inv_dir);
    Some(if a > b { (b, a) } else { (a, b) })
}

/// World-space ray through a point given in normalised device coordinates
/// (x right, y up, both in [-1, 1]) for a GL-convention projection.
pub fn screen_ray(camera_world: Mat4, projection: Mat4, ndc: Vec2) -> (Vec3, Vec3) {
    let inv_view_proj = (projection * camera_world.inverse()).inverse();
    let near = inv_view_proj.project_point3(ndc.extend(-1.0));
    let far = inv_view_proj.project_point3(ndc.extend(1.0));
    (near, (far - near).normalize_or_zero())
}

/// Project a world point to window pixels (origin top-left). None when behind the camera.
pub fn world_to_screen(
    camera_world: Mat4,
    projection: Mat4,
    point: Vec3,
    viewport: Vec2,
) -> Option<Vec2> {
    let clip = projection * camera_world.inverse() * point.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec2::new(
        (ndc.x + 1.0) * 0.5 * viewport.x,
        (1.0 - ndc.y) * 0.5 * viewport.y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_hit_from_outside() {
        let t = ray_aabb_hit_t(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!((t.unwrap() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_axis_parallel_ray_outside_slab_misses() {
        let t = ray_aabb_hit_t(Vec3::new(2.0, 5.0, 0.0), Vec3::NEG_Y, Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(t.is_none());
    }

    #[test]
    fn test_obb_respects_rotation_and_scale() {
        let xf = Transform::from_translation(Vec3::new(0.0, 0.0, -3.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4))
            .with_scale(Vec3::splat(2.0));
        let t = ray_hits_obb(Vec3::ZERO, Vec3::NEG_Z, &xf, Vec3::new(1.0, 1.0, 0.01));
        assert!((t.unwrap() - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_screen_ray_through_centre_looks_forward() {
        let projection = Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        let (origin, dir) = screen_ray(Mat4::IDENTITY, projection, Vec2::ZERO);
        assert!(origin.z < 0.0);
        assert!((dir - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_world_to_screen_centre_and_behind() {
        let projection = Mat4::perspective_rh_gl(1.0, 2.0, 0.1, 100.0);
        let viewport = Vec2::new(800.0, 400.0);
        let centre = world_to_screen(Mat4::IDENTITY, projection, Vec3::new(0.0, 0.0, -5.0), viewport);
        assert!((centre.unwrap() - Vec2::new(400.0, 200.0)).length() < 1e-3);
        assert!(world_to_screen(Mat4::IDENTITY, projection, Vec3::new(0.0, 0.0, 5.0), viewport).is_none());
    }
}
