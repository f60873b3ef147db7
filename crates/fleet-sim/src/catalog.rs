use crate::Route;

type Stop = (f64, f64, &'static str);

const CENTRO_NORTE: [Stop; 5] = [
    (19.4326, -99.1332, "Zócalo, Centro Histórico"),
    (19.4284, -99.1276, "Alameda Central"),
    (19.4240, -99.1220, "Paseo de la Reforma 222"),
    (19.4360, -99.1412, "Monumento a la Revolución"),
    (19.4445, -99.1543, "Santa María la Ribera"),
];

const SUR_PONIENTE: [Stop; 5] = [
    (19.3263, -99.1757, "Ciudad Universitaria"),
    (19.3500, -99.1700, "Perisur"),
    (19.3700, -99.1800, "Insurgentes Sur"),
    (19.3900, -99.1900, "San Ángel"),
    (19.4000, -99.2000, "Santa Fe"),
];

const ORIENTE: [Stop; 5] = [
    (19.4900, -99.0800, "Indios Verdes"),
    (19.4700, -99.0900, "La Villa"),
    (19.4500, -99.1000, "Lindavista"),
    (19.4400, -99.1100, "Instituto Politécnico Nacional"),
    (19.4300, -99.1200, "Tlatelolco"),
];

/// Demo delivery routes across Mexico City, one per driver.
pub fn predefined_routes() -> Vec<Route> {
    vec![
        Route::from_stops("1", "Ruta Centro - Norte", CENTRO_NORTE),
        Route::from_stops("2", "Ruta Sur - Poniente", SUR_PONIENTE),
        Route::from_stops("3", "Ruta Oriente", ORIENTE),
    ]
}
