use crate::models::{ErrorBody, Greeting, NewPet, Pet, Response};

/// @Summary List pets
/// @Tags pets
/// @Param tags query []string false "Filter by tags"
/// @Param limit query int false "Page size" minimum(1) maximum(100) default(20)
/// @Success 200 {array} Pet
/// @Router /pets [get]
pub fn list_pets(ctx: &mut Context) {}

/// @Summary Add a pet
/// @Tags pets
/// @Accept json
/// @Produce json
/// @Param pet body NewPet true "Pet to add"
/// @Success 201 {object} Pet
/// @Failure 400 {object} ErrorBody "Invalid pet"
/// @Security ApiKeyAuth
/// @Router /pets [post]
pub fn create_pet(ctx: &mut Context) {}

/// @Summary Show a pet
/// @Tags pets
/// @Param id path string true "Pet id"
/// @Success 200 {object} Pet
/// @Failure 404 {object} ErrorBody
/// @Router /pets/{id} [get]
pub fn show_pet(ctx: &mut Context) {
    let id = ctx.param("id");
    let verbose = ctx.query("verbose");
}

/// @Summary Remove a pet
/// @Tags pets
/// @Param id path int true "Pet id"
/// @Success 200 {object} Response
/// @Router /pets/{id} [delete]
pub fn delete_pet() {}

pub fn greet(ctx: &mut Context) {
    let name = ctx.param("name");
    ctx.json(200, Greeting { message: format!("Hello, {}", name) });
}
